mod common;
mod verification;
