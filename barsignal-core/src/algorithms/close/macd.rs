//! MACD close: registered so configurations naming it load, but it has no
//! benchmark model yet and never signals.

use crate::algorithms::{CloseAlgorithm, EvalContext};
use crate::domain::Signal;

#[derive(Debug, Clone, Default)]
pub struct MacdClose;

impl CloseAlgorithm for MacdClose {
    fn name(&self) -> &str {
        "macd"
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Option<Signal> {
        None
    }
}
