//! タスクモジュール
//!
//! 各タスクの実装を分離して管理します。

pub mod throttle;

// タスク関数を再エクスポート
pub use throttle::throttle_task;
