//! センサーフロントエンド
//!
//! 取得・キャリブレーション・物理量変換・スロットル処理をまとめた外部インターフェース。
//!
//! ## 使い方
//! 1. `initialize()` で起動時キャリブレーションを行い、PWMトリガーを有効化
//! 2. ADC割り込みから `on_conversion_complete()`（またはファームウェア側の静的ハンドラ）
//! 3. 制御周期ごとに `process_throttle_tick()` を1回呼ぶ
//!
//! 各ゲッターは最後にラッチした `EngineeringReading` を返します。

use crate::acquisition::AdcAcquisition;
use crate::calibration::{CalibrationEngine, CalibrationError, CalibrationSet};
use crate::channel_map::{AdcChannelMap, Phase, SensorChannel};
use crate::config::SensingConfig;
use crate::conversion::{EngineeringReading, UnitConversion};
use crate::hal::AdcHardware;
use crate::sample::{RawSampleSet, SampleCell};
use crate::throttle::{ThrottleFilter, ThrottleState, ThrottleStateMachine};

pub struct SensorFrontend<'a, H: AdcHardware> {
    hw: H,
    acquisition: AdcAcquisition,
    calibration: CalibrationEngine,
    conversion: UnitConversion,
    filter: ThrottleFilter,
    throttle: ThrottleStateMachine,
    samples: &'a SampleCell,
    latest: RawSampleSet,
    reading: EngineeringReading,
    armed: bool,
}

impl<'a, H: AdcHardware> SensorFrontend<'a, H> {
    pub fn new(
        hw: H,
        config: &SensingConfig,
        map: &AdcChannelMap,
        samples: &'a SampleCell,
    ) -> Self {
        Self {
            hw,
            acquisition: AdcAcquisition::new(*map),
            calibration: CalibrationEngine::new(&config.calibration, map),
            conversion: UnitConversion::new(&config.conversion, CalibrationSet::nominal()),
            filter: ThrottleFilter::new(&config.filter),
            throttle: ThrottleStateMachine::new(&config.throttle),
            samples,
            latest: RawSampleSet::default(),
            reading: EngineeringReading::default(),
            armed: false,
        }
    }

    /// ADC設定・起動時キャリブレーション・トリガー有効化
    ///
    /// キャリブレーションに失敗した場合はトリガーを有効化しません。
    pub fn initialize(&mut self) -> Result<(), CalibrationError> {
        self.acquisition.initialize(&mut self.hw);

        let set = self.calibration.calibrate(&mut self.hw)?;
        self.conversion.replace_calibration(set);
        self.filter.reset();

        self.acquisition.arm(&mut self.hw);
        self.armed = true;
        info!("Sensor frontend ready (Vref = {}V)", set.vref);
        Ok(())
    }

    /// インジェクテッド変換完了割り込みの本体
    pub fn on_conversion_complete(&self) {
        self.acquisition.on_conversion_complete(&self.hw, self.samples);
    }

    /// 最新サンプルをラッチして物理量を再計算
    pub fn latch(&mut self) {
        self.latest = self.samples.latest();
        self.reading = self.conversion.reading(&self.latest);
    }

    /// 制御周期ごとのスロットル処理
    ///
    /// # 戻り値
    /// 指令値（0.0〜1.0）
    pub fn process_throttle_tick(&mut self) -> f32 {
        self.latch();

        let before = self.throttle.state();
        let filtered = self.filter.process(self.reading.throttle_v);
        let output = self.throttle.update(filtered);

        // フォルトからの再起動時はフィルタ履歴を捨てる
        if before == ThrottleState::Fault && self.throttle.state() == ThrottleState::Startup {
            self.filter.reset();
        }
        output
    }

    /// 再キャリブレーション（全平均化をやり直す）
    ///
    /// スロットルはフォルトに落とし、起動ウィンドウからやり直させます。
    pub fn recalibrate(&mut self) -> Result<(), CalibrationError> {
        warn!("Recalibration requested, throttle forced to fault");
        self.throttle.force_fault();
        let set = self.calibration.calibrate(&mut self.hw)?;
        self.conversion.replace_calibration(set);
        Ok(())
    }

    /// 電流ヌル点の診断用上書き
    pub fn set_current_null(&mut self, phase: Phase, raw_offset: u16) {
        debug!("Current null override: {} = {}", phase, raw_offset);
        self.conversion.set_current_null(phase, raw_offset);
    }

    pub fn get_current(&self, phase: Phase) -> f32 {
        self.reading.current_a[phase.index()]
    }

    pub fn get_bus_voltage(&self) -> f32 {
        self.reading.bus_v
    }

    pub fn get_temperature_c(&self) -> f32 {
        self.reading.temperature_c
    }

    pub fn get_vref(&self) -> f32 {
        self.conversion.vref()
    }

    pub fn get_raw(&self, channel: SensorChannel) -> u16 {
        self.latest.get(channel)
    }

    pub fn reading(&self) -> &EngineeringReading {
        &self.reading
    }

    pub fn calibration(&self) -> &CalibrationSet {
        self.conversion.calibration()
    }

    pub fn throttle_state(&self) -> ThrottleState {
        self.throttle.state()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }
}
