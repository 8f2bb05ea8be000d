//! Condition trees and their compilation into placeholder-aliased
//! expression strings.

mod builder;
mod compile;
mod condition;

pub use builder::ExpressionBuilder;
pub use compile::{
    compile, compile_condition, compile_update, version_condition, ExpressionInput,
    Expressions, UpdateExpression,
};
pub use condition::{Comparator, Condition, PartitionKeyCondition, SortKeyCondition};
