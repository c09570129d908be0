//! テスト用のシミュレーションADC
//!
//! レギュラー変換は選択中のチャネルに応じた固定値（+交互ジッタ）を返し、
//! tickカウンタは `now_ticks()` が呼ばれるたびに1進みます。

use core::cell::Cell;

use crate::channel_map::{AdcChannelMap, AdcUnit, UNIT_COUNT, VREFINT_HW_CHANNEL};
use crate::hal::{AdcHardware, InjectedResults};

pub struct SimulatedAdc {
    injected: Cell<[[u16; 3]; UNIT_COUNT]>,
    acknowledged: Cell<u32>,
    configured: Cell<Option<AdcChannelMap>>,
    armed: Cell<bool>,
    regular_channel: Cell<[u8; UNIT_COUNT]>,
    /// 電流チャネルのレギュラー変換値（ユニットごと）
    current_level: Cell<[u16; UNIT_COUNT]>,
    vrefint_level: Cell<u16>,
    jitter: Cell<u16>,
    conversions: Cell<u32>,
    pending: Cell<bool>,
    stalled: Cell<bool>,
    vrefint_word: Cell<u16>,
    ticks: Cell<u32>,
    first_conversion_tick: Cell<Option<u32>>,
}

impl SimulatedAdc {
    pub fn new() -> Self {
        Self {
            injected: Cell::new([[0; 3]; UNIT_COUNT]),
            acknowledged: Cell::new(0),
            configured: Cell::new(None),
            armed: Cell::new(false),
            regular_channel: Cell::new([0; UNIT_COUNT]),
            current_level: Cell::new([2048; UNIT_COUNT]),
            vrefint_level: Cell::new(1501),
            jitter: Cell::new(0),
            conversions: Cell::new(0),
            pending: Cell::new(false),
            stalled: Cell::new(false),
            vrefint_word: Cell::new(1501),
            ticks: Cell::new(0),
            first_conversion_tick: Cell::new(None),
        }
    }

    pub fn set_injected(&self, unit: AdcUnit, slots: [u16; 3]) {
        let mut all = self.injected.get();
        all[unit.index()] = slots;
        self.injected.set(all);
    }

    pub fn set_current_levels(&self, levels: [u16; UNIT_COUNT]) {
        self.current_level.set(levels);
    }

    pub fn set_vrefint_level(&self, code: u16) {
        self.vrefint_level.set(code);
    }

    /// 奇数回目の変換に `amplitude` を加算する
    pub fn set_jitter(&self, amplitude: u16) {
        self.jitter.set(amplitude);
    }

    pub fn set_vrefint_word(&self, word: u16) {
        self.vrefint_word.set(word);
    }

    pub fn set_ticks(&self, ticks: u32) {
        self.ticks.set(ticks);
    }

    /// 変換完了しない故障状態
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.set(stalled);
    }

    pub fn acknowledge_count(&self) -> u32 {
        self.acknowledged.get()
    }

    pub fn configured_map(&self) -> Option<AdcChannelMap> {
        self.configured.get()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }

    pub fn regular_channel(&self, unit: AdcUnit) -> u8 {
        self.regular_channel.get()[unit.index()]
    }

    pub fn conversions(&self) -> u32 {
        self.conversions.get()
    }

    pub fn first_conversion_tick(&self) -> Option<u32> {
        self.first_conversion_tick.get()
    }
}

impl InjectedResults for SimulatedAdc {
    fn read_injected(&self, unit: AdcUnit, slot: usize) -> u16 {
        self.injected.get()[unit.index()][slot]
    }

    fn acknowledge(&self) {
        self.acknowledged.set(self.acknowledged.get() + 1);
    }
}

impl AdcHardware for SimulatedAdc {
    fn configure_sequences(&mut self, map: &AdcChannelMap) {
        self.configured.set(Some(*map));
        let mut regular = [0u8; UNIT_COUNT];
        for seq in map.units.iter() {
            regular[seq.unit.index()] = seq.regular.hw_channel;
        }
        self.regular_channel.set(regular);
    }

    fn select_regular_channel(&mut self, unit: AdcUnit, hw_channel: u8) {
        let mut regular = self.regular_channel.get();
        regular[unit.index()] = hw_channel;
        self.regular_channel.set(regular);
    }

    fn start_regular_conversion(&mut self) {
        if self.first_conversion_tick.get().is_none() {
            self.first_conversion_tick.set(Some(self.ticks.get()));
        }
        self.conversions.set(self.conversions.get() + 1);
        self.pending.set(true);
    }

    fn regular_conversion_done(&self) -> bool {
        self.pending.get() && !self.stalled.get()
    }

    fn read_regular(&mut self, unit: AdcUnit) -> u16 {
        if unit == AdcUnit::MASTER {
            self.pending.set(false);
        }
        let base = if self.regular_channel(unit) == VREFINT_HW_CHANNEL {
            self.vrefint_level.get()
        } else {
            self.current_level.get()[unit.index()]
        };
        if self.conversions.get() % 2 == 1 {
            base + self.jitter.get()
        } else {
            base
        }
    }

    fn vrefint_calibration_word(&self) -> u16 {
        self.vrefint_word.get()
    }

    fn arm_injected_trigger(&mut self) {
        self.armed.set(true);
    }

    fn now_ticks(&self) -> u32 {
        let now = self.ticks.get();
        self.ticks.set(now.wrapping_add(1));
        now
    }
}
