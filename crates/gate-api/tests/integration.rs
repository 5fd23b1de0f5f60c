// Single integration test binary; each module covers one handler end to end.

mod common;
