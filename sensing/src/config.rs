//! Configuration module
//!
//! 起動時に一度だけ構築し、各コンポーネントへ参照で渡す設定構造体を提供します。
//! 各フィールドのデフォルト値は `params` の定数です。

pub mod params;

pub use params::{ADC_FULL_SCALE, ADC_MAX_CODE};

/// 起動時キャリブレーション設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationConfig {
    /// 平均化サンプル数
    pub sample_count: u16,
    /// アナログ電源安定化待ち [tick]
    pub settle_ticks: u32,
    /// 1変換あたりのタイムアウト [tick]
    pub conversion_timeout_ticks: u32,
    /// 電流ヌル点のハードウェアバイアス [code]
    pub current_null_bias: u16,
    /// Vrefint工場校正値の有効範囲
    pub vrefint_cal_min: u16,
    pub vrefint_cal_max: u16,
    /// 工場校正時のアナログ電源電圧 [V]
    pub vrefint_cal_supply: f32,
    /// 校正値が無効なときのVrefint [V]
    pub vrefint_default: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        use params::calibration::*;
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
            settle_ticks: DEFAULT_SETTLE_TICKS,
            conversion_timeout_ticks: DEFAULT_CONVERSION_TIMEOUT_TICKS,
            current_null_bias: DEFAULT_CURRENT_NULL_BIAS,
            vrefint_cal_min: DEFAULT_VREFINT_CAL_MIN,
            vrefint_cal_max: DEFAULT_VREFINT_CAL_MAX,
            vrefint_cal_supply: DEFAULT_VREFINT_CAL_SUPPLY,
            vrefint_default: DEFAULT_VREFINT,
        }
    }
}

/// 物理量変換設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionConfig {
    /// シャント抵抗 [Ω]
    pub shunt_ohms: f32,
    /// 電流アンプゲイン
    pub amp_gain: f32,
    /// バス電圧分圧の上側抵抗 [Ω]
    pub vbus_r_upper: f32,
    /// バス電圧分圧の下側抵抗 [Ω]
    pub vbus_r_lower: f32,
    /// サーミスタ分圧の固定抵抗 [Ω]
    pub temp_fixed_ohms: f32,
    /// サーミスタ25℃抵抗 [Ω]
    pub thermistor_r25: f32,
    /// サーミスタB定数 [K]
    pub thermistor_beta: f32,
}

impl ConversionConfig {
    /// バス電圧の分圧比 (R_upper + R_lower) / R_lower
    pub fn divider_ratio(&self) -> f32 {
        (self.vbus_r_upper + self.vbus_r_lower) / self.vbus_r_lower
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        use params::conversion::*;
        Self {
            shunt_ohms: DEFAULT_SHUNT_OHMS,
            amp_gain: DEFAULT_AMP_GAIN,
            vbus_r_upper: DEFAULT_VBUS_R_UPPER,
            vbus_r_lower: DEFAULT_VBUS_R_LOWER,
            temp_fixed_ohms: DEFAULT_TEMP_FIXED_OHMS,
            thermistor_r25: DEFAULT_THERMISTOR_R25,
            thermistor_beta: DEFAULT_THERMISTOR_BETA,
        }
    }
}

/// スロットル安全処理設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleConfig {
    /// 起動ウィンドウ全体 [tick]
    pub start_time: u32,
    /// 入力を無視する起動直後の期間 [tick]
    pub start_deadtime: u32,
    /// 起動時安全判定のマージン [V]
    pub range_limit: f32,
    pub throttle_min_default: f32,
    pub throttle_max_default: f32,
    /// 学習した静止電圧に上乗せする不感幅 [V]
    pub rest_margin: f32,
    /// フォルト解除時に断線しきい値へ上乗せする幅 [V]
    pub hysteresis_low: f32,
    /// 最大値を超えてフォルトとするまでの幅 [V]
    pub hysteresis_high: f32,
    /// 断線検出しきい値 [V]
    pub dropout_threshold: f32,
    /// 最大上昇量 [1/tick]
    pub slew_rate: f32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        use params::throttle::*;
        Self {
            start_time: DEFAULT_START_TIME,
            start_deadtime: DEFAULT_START_DEADTIME,
            range_limit: DEFAULT_RANGE_LIMIT,
            throttle_min_default: DEFAULT_MIN,
            throttle_max_default: DEFAULT_MAX,
            rest_margin: DEFAULT_REST_MARGIN,
            hysteresis_low: DEFAULT_HYSTERESIS_LOW,
            hysteresis_high: DEFAULT_HYSTERESIS_HIGH,
            dropout_threshold: DEFAULT_DROPOUT,
            slew_rate: DEFAULT_SLEW_RATE,
        }
    }
}

/// 2次IIRフィルタ係数（a0 = 1 で正規化済み）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub a1: f32,
    pub a2: f32,
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
}

impl BiquadCoefficients {
    /// 直流ゲイン (b0 + b1 + b2) / (1 + a1 + a2)
    pub fn dc_gain(&self) -> f32 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        use params::filter::*;
        Self {
            a1: DEFAULT_A1,
            a2: DEFAULT_A2,
            b0: DEFAULT_B0,
            b1: DEFAULT_B1,
            b2: DEFAULT_B2,
        }
    }
}

/// センシングフロントエンド全体の設定
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensingConfig {
    pub calibration: CalibrationConfig,
    pub conversion: ConversionConfig,
    pub throttle: ThrottleConfig,
    pub filter: BiquadCoefficients,
}
