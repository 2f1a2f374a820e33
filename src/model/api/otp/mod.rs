mod code;

pub use code::{random_withdrawal_token, Code, ParseError, ShortCode, CODE_LENGTH};
