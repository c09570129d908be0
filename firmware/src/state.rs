//! グローバル共有状態管理
//!
//! タスク間で共有される状態をMutexで保護して管理します。

use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::mutex::Mutex;

use ebike_sensing::{Phase, ThrottleState};

/// スロットル処理の出力（モーター制御側が参照）
#[derive(Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThrottleStatus {
    /// 指令値（0.0〜1.0）
    pub command: f32,
    pub state: ThrottleState,
    /// DCバス電圧 [V]
    pub bus_voltage: f32,
    /// パワー段温度 [℃]
    pub temperature_c: f32,
}

impl ThrottleStatus {
    pub const fn new() -> Self {
        Self {
            command: 0.0,
            state: ThrottleState::Init,
            bus_voltage: 0.0,
            temperature_c: 0.0,
        }
    }
}

/// スロットルステータス
pub static THROTTLE_STATUS: Mutex<ThreadModeRawMutex, ThrottleStatus> =
    Mutex::new(ThrottleStatus::new());

/// 再キャリブレーション要求フラグ
pub static RECALIBRATION_REQUEST: Mutex<ThreadModeRawMutex, bool> = Mutex::new(false);

/// 電流ヌル点の診断用上書き要求
pub static CURRENT_NULL_OVERRIDE: Mutex<ThreadModeRawMutex, Option<(Phase, u16)>> =
    Mutex::new(None);
