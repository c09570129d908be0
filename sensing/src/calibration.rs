//! 起動時ADCキャリブレーション
//!
//! 制御ループ開始前に一度だけ実行し、以下を求めます。
//! - 各相電流センサーのヌル点（平均値からハードウェアバイアスを差し引いた値）
//! - 内部基準電圧（Vrefint）の実測から求めたADCフルスケール電圧
//!
//! ソフトウェアトリガーの単発変換をスピン待ちで繰り返すため、
//! 周期ループが動き出す前にしか呼んではいけません。

use crate::channel_map::{AdcChannelMap, AdcUnit, VREFINT_HW_CHANNEL};
use crate::config::{CalibrationConfig, ADC_FULL_SCALE};
use crate::hal::AdcHardware;

/// キャリブレーション結果
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationSet {
    /// 各相の電流ヌル点 [code]（バイアス補正済み）
    pub current_null: [u16; 3],
    /// ADCフルスケール電圧 [V]
    pub vref: f32,
    /// 計算に用いた内部基準電圧 [V]
    pub vrefint: f32,
    /// Vrefintが工場校正値から得られたか（false: 公称値にフォールバック）
    pub vrefint_from_factory: bool,
}

impl CalibrationSet {
    /// キャリブレーション前の公称値（ヌル点 = 中点、3.3V基準）
    pub const fn nominal() -> Self {
        Self {
            current_null: [ADC_FULL_SCALE / 2; 3],
            vref: 3.3,
            vrefint: 1.21,
            vrefint_from_factory: false,
        }
    }
}

impl Default for CalibrationSet {
    fn default() -> Self {
        Self::nominal()
    }
}

/// キャリブレーションエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// 変換完了（EOC）がタイムアウト内に立たなかった
    ConversionTimeout,
    /// Vrefintの平均値が0（基準電圧を計算できない）
    ReferenceUnreadable,
}

/// 起動時キャリブレーション
pub struct CalibrationEngine {
    config: CalibrationConfig,
    map: AdcChannelMap,
}

impl CalibrationEngine {
    pub fn new(config: &CalibrationConfig, map: &AdcChannelMap) -> Self {
        Self {
            config: *config,
            map: *map,
        }
    }

    /// 工場校正値から内部基準電圧を求める
    ///
    /// # 戻り値
    /// * `(vrefint [V], 工場校正値を使ったか)`
    pub fn reference_voltage(&self, word: u16) -> (f32, bool) {
        if (self.config.vrefint_cal_min..=self.config.vrefint_cal_max).contains(&word) {
            let vrefint = self.config.vrefint_cal_supply * word as f32 / ADC_FULL_SCALE as f32;
            (vrefint, true)
        } else {
            (self.config.vrefint_default, false)
        }
    }

    /// キャリブレーションを実行
    pub fn calibrate<H: AdcHardware>(&self, hw: &mut H) -> Result<CalibrationSet, CalibrationError> {
        info!("Starting ADC calibration...");

        // 1. Vrefint工場校正値
        let word = hw.vrefint_calibration_word();
        let (vrefint, from_factory) = self.reference_voltage(word);
        if from_factory {
            info!("  Vrefint factory word: {} ({}V)", word, vrefint);
        } else {
            warn!(
                "Vrefint factory word {} out of range, using default {}V",
                word, vrefint
            );
        }

        // 2. アナログ電源の安定待ち
        self.wait_ticks(hw, self.config.settle_ticks);

        // 3. 相電流ヌル点
        let means = self.average_currents(hw)?;
        let bias = self.config.current_null_bias;
        let current_null = [
            means[0].saturating_sub(bias),
            means[1].saturating_sub(bias),
            means[2].saturating_sub(bias),
        ];
        info!(
            "  Current null: A={}, B={}, C={} (bias {})",
            current_null[0], current_null[1], current_null[2], bias
        );

        // 4. マスターのレギュラースロットをVrefintに切り替えて平均
        let master = AdcUnit::MASTER;
        let restore = self.map.sequence(master).regular.hw_channel;
        hw.select_regular_channel(master, VREFINT_HW_CHANNEL);
        let vrefint_mean = self.average_master(hw);

        // 5. 元のチャネルに戻す（エラー時も）
        hw.select_regular_channel(master, restore);

        let vrefint_mean = vrefint_mean?;
        if vrefint_mean == 0 {
            error!("Vrefint reads zero, cannot derive reference voltage");
            return Err(CalibrationError::ReferenceUnreadable);
        }
        let vref = vrefint / (vrefint_mean as f32 / ADC_FULL_SCALE as f32);
        info!("  Vrefint mean: {} -> Vref = {}V", vrefint_mean, vref);

        Ok(CalibrationSet {
            current_null,
            vref,
            vrefint,
            vrefint_from_factory: from_factory,
        })
    }

    fn sample_count(&self) -> u32 {
        self.config.sample_count.max(1) as u32
    }

    /// tickカウンタのラップアラウンドを考慮して待つ
    fn wait_ticks<H: AdcHardware>(&self, hw: &H, ticks: u32) {
        let start = hw.now_ticks();
        while hw.now_ticks().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }

    /// 1回のソフトウェアトリガー変換を完了まで待つ
    fn convert_once<H: AdcHardware>(&self, hw: &mut H) -> Result<(), CalibrationError> {
        hw.start_regular_conversion();
        let start = hw.now_ticks();
        while !hw.regular_conversion_done() {
            if hw.now_ticks().wrapping_sub(start) >= self.config.conversion_timeout_ticks {
                error!("ADC conversion timeout during calibration");
                return Err(CalibrationError::ConversionTimeout);
            }
            core::hint::spin_loop();
        }
        Ok(())
    }

    /// 3ユニット同時変換の平均値（Ia, Ib, Ic）
    fn average_currents<H: AdcHardware>(&self, hw: &mut H) -> Result<[u16; 3], CalibrationError> {
        let mut sums = [0u32; 3];
        for _ in 0..self.sample_count() {
            self.convert_once(hw)?;
            for unit in AdcUnit::ALL {
                sums[unit.index()] += hw.read_regular(unit) as u32;
            }
        }
        let n = self.sample_count();
        Ok([
            (sums[0] / n) as u16,
            (sums[1] / n) as u16,
            (sums[2] / n) as u16,
        ])
    }

    /// マスターユニットのみの平均値
    fn average_master<H: AdcHardware>(&self, hw: &mut H) -> Result<u16, CalibrationError> {
        let mut sum = 0u32;
        for _ in 0..self.sample_count() {
            self.convert_once(hw)?;
            sum += hw.read_regular(AdcUnit::MASTER) as u32;
        }
        Ok((sum / self.sample_count()) as u16)
    }
}
