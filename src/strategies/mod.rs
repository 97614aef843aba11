//! Rule compilation and evaluation

pub mod evaluator;
pub mod parser;

pub use evaluator::RuleEvaluator;
pub use parser::{compile, compile_one, ParseError};
