//! ハードウェアとタスクの設定パラメータ

/// スロットル処理周期 [μs]（1kHz = 1000μs）
pub const DEFAULT_THROTTLE_PERIOD_US: u64 = 1000;

/// ステータスログ間隔 [tick]（1kHzで1秒）
pub const STATUS_LOG_INTERVAL_TICKS: u32 = 1000;

/// 再キャリブレーション要求のポーリング間隔 [tick]
pub const REQUEST_POLL_INTERVAL_TICKS: u32 = 100;

/// PWM設定
pub mod pwm {
    use embassy_stm32::time::Hertz;

    /// PWM周波数（20kHz）（デフォルト値）
    pub const DEFAULT_FREQUENCY: Hertz = Hertz(20_000);

    /// デッドタイム（デフォルト値）
    pub const DEFAULT_DEAD_TIME: u16 = 84;

    /// ADCトリガー位置（CH4コンペア値のARR比、0.0-1.0）
    /// ローサイドON期間の中央付近でサンプリングする
    pub const ADC_TRIGGER_RATIO: f32 = 0.95;
}

/// ADC設定
pub mod adc {
    /// ADC割り込み優先度（Embassyタスクより高優先度、上位4ビット）
    pub const IRQ_PRIORITY: u8 = 0x10;

    /// Vrefint工場校正値のアドレス（STM32F405）
    pub const VREFINT_CAL_ADDR: usize = 0x1FFF_7A2A;
}
