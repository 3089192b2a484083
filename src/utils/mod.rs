pub mod hasher;
pub mod ip;
pub mod url_validator;
