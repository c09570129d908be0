//! スロットル処理
//!
//! - `filter`: スロットル電圧の2次IIRローパスフィルタ
//! - `state_machine`: 起動時安全判定・断線検出・スルーレート制限付きの指令生成

pub mod filter;
pub mod state_machine;

pub use filter::ThrottleFilter;
pub use state_machine::{slew_limit, ThrottleContext, ThrottleState, ThrottleStateMachine};
