//! Configuration module
//!
//! ファームウェア側（タイマー・割り込み・タスク周期）の設定を提供します。
//! センシング処理の設定は `ebike_sensing::SensingConfig` を参照。

pub mod params;

// params.rsから主要な定数を再エクスポート
pub use params::*;
