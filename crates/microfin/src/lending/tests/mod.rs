mod common;

mod membership;
