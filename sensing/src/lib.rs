//! e-bike controller sensing front end
//!
//! 同期ADC取得・起動時キャリブレーション・物理量変換・スロットル安全処理。
//! ハードウェア依存部は `hal` のトレイトに切り出してあり、ホスト上でテストできます。
#![cfg_attr(not(test), no_std)]

// fmtは他のモジュールより先に宣言する（マクロのスコープ）
mod fmt;

pub mod acquisition;
pub mod calibration;
pub mod channel_map;
pub mod config;
pub mod conversion;
pub mod frontend;
pub mod hal;
pub mod sample;
pub mod throttle;

#[cfg(test)]
mod sim;

pub use acquisition::AdcAcquisition;
pub use calibration::{CalibrationEngine, CalibrationError, CalibrationSet};
pub use channel_map::{AdcChannelMap, AdcUnit, Phase, SensorChannel};
pub use config::SensingConfig;
pub use conversion::{EngineeringReading, UnitConversion, TEMPERATURE_SENTINEL_C};
pub use frontend::SensorFrontend;
pub use hal::{AdcHardware, InjectedResults};
pub use sample::{RawSampleSet, SampleCell};
pub use throttle::{ThrottleFilter, ThrottleState, ThrottleStateMachine};
