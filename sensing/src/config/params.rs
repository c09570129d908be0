//! センシング・スロットル処理のデフォルトパラメータ

/// ADC分解能（12ビット = 4096）
pub const ADC_FULL_SCALE: u16 = 4096;

/// ADC生値の最大値
pub const ADC_MAX_CODE: u16 = ADC_FULL_SCALE - 1;

/// 起動時キャリブレーション
pub mod calibration {
    /// 平均化サンプル数
    pub const DEFAULT_SAMPLE_COUNT: u16 = 128;

    /// アナログ電源安定化待ち [tick]
    pub const DEFAULT_SETTLE_TICKS: u32 = 50;

    /// 1変換あたりのタイムアウト [tick]
    pub const DEFAULT_CONVERSION_TIMEOUT_TICKS: u32 = 10;

    /// 電流センサーヌル点から差し引くハードウェアバイアス [code]
    pub const DEFAULT_CURRENT_NULL_BIAS: u16 = 6;

    /// Vrefint工場校正値の有効下限（3.3V基準で約1.13V）
    pub const DEFAULT_VREFINT_CAL_MIN: u16 = 1403;

    /// Vrefint工場校正値の有効上限（3.3V基準で約1.29V）
    pub const DEFAULT_VREFINT_CAL_MAX: u16 = 1601;

    /// 工場校正時のアナログ電源電圧 [V]
    pub const DEFAULT_VREFINT_CAL_SUPPLY: f32 = 3.30;

    /// 校正値が範囲外のときに使うVrefint公称値 [V]
    pub const DEFAULT_VREFINT: f32 = 1.21;
}

/// 物理量変換（シャント、分圧抵抗、サーミスタ）
pub mod conversion {
    /// 電流検出シャント抵抗 [Ω]
    pub const DEFAULT_SHUNT_OHMS: f32 = 0.001;

    /// 電流検出アンプゲイン
    pub const DEFAULT_AMP_GAIN: f32 = 20.0;

    /// バス電圧分圧の上側抵抗 [Ω]
    pub const DEFAULT_VBUS_R_UPPER: f32 = 68_000.0;

    /// バス電圧分圧の下側抵抗 [Ω]
    pub const DEFAULT_VBUS_R_LOWER: f32 = 3_300.0;

    /// サーミスタ分圧の固定抵抗 [Ω]
    pub const DEFAULT_TEMP_FIXED_OHMS: f32 = 10_000.0;

    /// サーミスタの25℃抵抗値 [Ω]
    pub const DEFAULT_THERMISTOR_R25: f32 = 10_000.0;

    /// サーミスタのB定数 [K]
    pub const DEFAULT_THERMISTOR_BETA: f32 = 3380.0;
}

/// スロットル安全処理（1kHz tick基準）
pub mod throttle {
    /// 起動ウィンドウ全体 [tick]
    pub const DEFAULT_START_TIME: u32 = 1000;

    /// 起動ウィンドウ先頭の入力無視期間（フィルタ安定化） [tick]
    pub const DEFAULT_START_DEADTIME: u32 = 500;

    /// 起動時の安全判定マージン [V]（最小値からの許容量）
    pub const DEFAULT_RANGE_LIMIT: f32 = 0.05;

    /// スロットル最小電圧 [V]
    pub const DEFAULT_MIN: f32 = 0.85;

    /// スロットル最大電圧 [V]
    pub const DEFAULT_MAX: f32 = 2.20;

    /// 静止電圧の学習値に上乗せする不感幅 [V]
    /// 起動ウィンドウ中はフィルタがまだ立ち上がり途中のため、学習値は実際の静止電圧より低く出る
    pub const DEFAULT_REST_MARGIN: f32 = 0.01;

    /// フォルト解除側の低電圧ヒステリシス [V]
    pub const DEFAULT_HYSTERESIS_LOW: f32 = 0.025;

    /// フォルト検出側の高電圧ヒステリシス [V]
    pub const DEFAULT_HYSTERESIS_HIGH: f32 = 0.030;

    /// 断線検出しきい値 [V]
    pub const DEFAULT_DROPOUT: f32 = 0.72;

    /// 指令の最大上昇量 [1/tick]（1kHzで0.125%/tick）
    pub const DEFAULT_SLEW_RATE: f32 = 0.00125;
}

/// スロットルLPF係数（Fs = 1kHz, f0 = 2Hz, Q = 0.45）
///
/// 応答はやや緩やか。
pub mod filter {
    pub const DEFAULT_A1: f32 = -1.972304;
    pub const DEFAULT_A2: f32 = 0.9724600;
    pub const DEFAULT_B0: f32 = 0.00003893429;
    pub const DEFAULT_B1: f32 = 0.00007786857;
    pub const DEFAULT_B2: f32 = 0.00003893429;
}
