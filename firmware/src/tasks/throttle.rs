//! スロットル処理タスク
//!
//! 1kHzで最新サンプルをラッチし、スロットル指令値を生成して共有状態へ公開します。

use embassy_time::{Duration, Instant, Ticker};

use ebike_sensing::{Phase, SensorFrontend, ThrottleState};

use crate::adc_irq;
use crate::config::*;
use crate::fmt::*;
use crate::hardware::Stm32Adc;
use crate::state::{CURRENT_NULL_OVERRIDE, RECALIBRATION_REQUEST, THROTTLE_STATUS};

/// スロットル処理タスク（1kHz）
#[embassy_executor::task]
pub async fn throttle_task(mut frontend: SensorFrontend<'static, Stm32Adc>) {
    info!("Throttle task started");

    let mut ticker = Ticker::every(Duration::from_micros(DEFAULT_THROTTLE_PERIOD_US));

    let mut prev_state = frontend.throttle_state();
    let mut log_counter = 0u32;
    let mut poll_counter = 0u32;

    loop {
        ticker.next().await;

        let command = frontend.process_throttle_tick();
        let state = frontend.throttle_state();

        // 状態遷移ログ
        if state != prev_state {
            match state {
                ThrottleState::Fault => error!("Throttle state: {} -> {}", prev_state, state),
                _ => info!("Throttle state: {} -> {}", prev_state, state),
            }
            prev_state = state;
        }

        // グローバル状態を更新（モーター制御側が参照）
        {
            let mut status = THROTTLE_STATUS.lock().await;
            status.command = command;
            status.state = state;
            status.bus_voltage = frontend.get_bus_voltage();
            status.temperature_c = frontend.get_temperature_c();
        }

        // 診断要求のポーリング
        poll_counter += 1;
        if poll_counter >= REQUEST_POLL_INTERVAL_TICKS {
            poll_counter = 0;
            if service_requests(&mut frontend).await {
                // 再キャリブレーション中は制御周期が止まる。溜まった周期をまとめて処理しないよう
                // 基準時刻を取り直す（スロットルはフォルト中なので出力は0のまま）
                ticker.reset();
            }
        }

        // デバッグログ（1秒ごと）
        log_counter += 1;
        if log_counter >= STATUS_LOG_INTERVAL_TICKS {
            log_counter = 0;
            info!(
                "[Sensors] Ia={}A, Ib={}A, Ic={}A, Vbus={}V, T={}C, Vref={}V",
                frontend.get_current(Phase::A),
                frontend.get_current(Phase::B),
                frontend.get_current(Phase::C),
                frontend.get_bus_voltage(),
                frontend.get_temperature_c(),
                frontend.get_vref()
            );
            info!(
                "[Throttle] state={}, cmd={}, V={}V, irq={}",
                state,
                command,
                frontend.reading().throttle_v,
                adc_irq::irq_count()
            );
        }
    }
}

/// 再キャリブレーションと電流ヌル点上書きの要求を処理
///
/// 再キャリブレーションはブロッキング（整定待ち + 平均化で約60ms）。
/// 実行した場合は `true` を返す。
async fn service_requests(frontend: &mut SensorFrontend<'static, Stm32Adc>) -> bool {
    let override_request = CURRENT_NULL_OVERRIDE.lock().await.take();
    if let Some((phase, raw_offset)) = override_request {
        frontend.set_current_null(phase, raw_offset);
        info!("Current null override applied: {} = {}", phase, raw_offset);
    }

    let recalibrate = core::mem::replace(&mut *RECALIBRATION_REQUEST.lock().await, false);
    if !recalibrate {
        return false;
    }

    let started = Instant::now();
    match frontend.recalibrate() {
        Ok(()) => {
            let cal = frontend.calibration();
            info!(
                "Recalibration complete: null={}/{}/{}, Vref={}V",
                cal.current_null[0], cal.current_null[1], cal.current_null[2], cal.vref
            );
        }
        Err(e) => error!("Recalibration failed: {}, keeping previous calibration", e),
    }
    info!("Control loop paused {}ms for recalibration", started.elapsed().as_millis());
    true
}
