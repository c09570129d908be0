//! ADCチャネル割り当て
//!
//! 論理信号と物理ADCユニット/チャネル/インジェクテッドスロットの静的な対応表。
//! 3ユニットが同一トリガーで同時に3スロットずつ変換し、1 PWM周期内に全信号を取得します。
//!
//! | ユニット | レギュラー | JDR1     | JDR2      | JDR3       |
//! |----------|-----------|----------|-----------|------------|
//! | ADC1     | Ia (10)   | Ia (10)  | Vrefint (17) | Vrefint (17) |
//! | ADC2     | Ib (11)   | Ib (11)  | Throttle1 (15) | Temp (9) |
//! | ADC3     | Ic (12)   | Ic (12)  | Vbus (13) | Throttle2 (8) |

/// 論理チャネル数
pub const CHANNEL_COUNT: usize = 8;

/// ADCユニット数
pub const UNIT_COUNT: usize = 3;

/// 1ユニットあたりのインジェクテッドスロット数
pub const INJECTED_SLOTS: usize = 3;

/// 内部基準電圧のハードウェアチャネル番号
pub const VREFINT_HW_CHANNEL: u8 = 17;

/// 論理信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorChannel {
    Ia = 0,
    Ib = 1,
    Ic = 2,
    Vbus = 3,
    Throttle1 = 4,
    Throttle2 = 5,
    Temperature = 6,
    Vrefint = 7,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; CHANNEL_COUNT] = [
        SensorChannel::Ia,
        SensorChannel::Ib,
        SensorChannel::Ic,
        SensorChannel::Vbus,
        SensorChannel::Throttle1,
        SensorChannel::Throttle2,
        SensorChannel::Temperature,
        SensorChannel::Vrefint,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// モーター相
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    A = 0,
    B = 1,
    C = 2,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    /// 相電流の論理チャネル
    pub const fn channel(self) -> SensorChannel {
        match self {
            Phase::A => SensorChannel::Ia,
            Phase::B => SensorChannel::Ib,
            Phase::C => SensorChannel::Ic,
        }
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// ADCユニット（ADC1がマスター）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcUnit {
    Adc1 = 0,
    Adc2 = 1,
    Adc3 = 2,
}

impl AdcUnit {
    pub const ALL: [AdcUnit; UNIT_COUNT] = [AdcUnit::Adc1, AdcUnit::Adc2, AdcUnit::Adc3];

    /// ソフトウェアトリガーで全ユニットを同時起動するマスター
    pub const MASTER: AdcUnit = AdcUnit::Adc1;

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// インジェクテッドスロット1つ分の割り当て
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBinding {
    /// ハードウェアチャネル番号
    pub hw_channel: u8,
    /// 格納先の論理チャネル
    pub signal: SensorChannel,
}

/// 1ユニット分のシーケンス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSequence {
    pub unit: AdcUnit,
    /// レギュラー変換チャネル（起動時キャリブレーションで使用）
    pub regular: SlotBinding,
    /// インジェクテッドシーケンス（JDR1..JDR3の順）
    pub injected: [SlotBinding; INJECTED_SLOTS],
}

/// 静的チャネル割り当て表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcChannelMap {
    pub units: [UnitSequence; UNIT_COUNT],
}

const fn bind(hw_channel: u8, signal: SensorChannel) -> SlotBinding {
    SlotBinding { hw_channel, signal }
}

impl AdcChannelMap {
    /// 基板の配線に対応するデフォルト割り当て
    pub const DEFAULT: AdcChannelMap = AdcChannelMap {
        units: [
            UnitSequence {
                unit: AdcUnit::Adc1,
                regular: bind(10, SensorChannel::Ia),
                injected: [
                    bind(10, SensorChannel::Ia),
                    bind(VREFINT_HW_CHANNEL, SensorChannel::Vrefint),
                    bind(VREFINT_HW_CHANNEL, SensorChannel::Vrefint),
                ],
            },
            UnitSequence {
                unit: AdcUnit::Adc2,
                regular: bind(11, SensorChannel::Ib),
                injected: [
                    bind(11, SensorChannel::Ib),
                    bind(15, SensorChannel::Throttle1),
                    bind(9, SensorChannel::Temperature),
                ],
            },
            UnitSequence {
                unit: AdcUnit::Adc3,
                regular: bind(12, SensorChannel::Ic),
                injected: [
                    bind(12, SensorChannel::Ic),
                    bind(13, SensorChannel::Vbus),
                    bind(8, SensorChannel::Throttle2),
                ],
            },
        ],
    };

    /// ユニットのシーケンスを取得
    pub const fn sequence(&self, unit: AdcUnit) -> &UnitSequence {
        &self.units[unit.index()]
    }

    /// 各論理チャネルが割り当てられているスロット数
    ///
    /// 0のチャネルがあれば配線表の誤り。
    pub const fn slot_counts(&self) -> [u8; CHANNEL_COUNT] {
        let mut counts = [0u8; CHANNEL_COUNT];
        let mut u = 0;
        while u < UNIT_COUNT {
            let mut s = 0;
            while s < INJECTED_SLOTS {
                counts[self.units[u].injected[s].signal.index()] += 1;
                s += 1;
            }
            u += 1;
        }
        counts
    }
}

// コンパイル時チェック：全論理チャネルがいずれかのスロットに割り当てられていること
const _: () = {
    let counts = AdcChannelMap::DEFAULT.slot_counts();
    let mut i = 0;
    while i < CHANNEL_COUNT {
        assert!(counts[i] > 0, "unmapped sensor channel");
        i += 1;
    }
};
