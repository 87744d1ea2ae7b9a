pub mod evaluator;
pub mod plan;

pub use evaluator::{BarContext, CmpOp, Condition, Operand, SignalEvaluator, SignalRules};
pub use plan::StrategyPlan;
