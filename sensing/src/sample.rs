//! 生サンプルと割り込み/ループ間の受け渡しセル
//!
//! 書き込みはADC割り込みのみ、読み出しは制御ループのみ（1対1）。
//! シーケンスカウンタが奇数の間は書き込み中を表し、読み出し側は
//! カウンタが偶数かつ前後で一致するまで読み直します。ロックは使いません。

use core::sync::atomic::{fence, AtomicU16, AtomicU32, Ordering};

use crate::channel_map::{SensorChannel, CHANNEL_COUNT};
use crate::config::ADC_MAX_CODE;

/// 1制御周期分の生ADC値（0-4095）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSampleSet {
    codes: [u16; CHANNEL_COUNT],
}

impl RawSampleSet {
    /// 12ビットにマスクして生成
    pub fn from_codes(codes: [u16; CHANNEL_COUNT]) -> Self {
        let mut masked = codes;
        for code in masked.iter_mut() {
            *code &= ADC_MAX_CODE;
        }
        Self { codes: masked }
    }

    #[inline(always)]
    pub fn get(&self, channel: SensorChannel) -> u16 {
        self.codes[channel.index()]
    }

    pub fn codes(&self) -> &[u16; CHANNEL_COUNT] {
        &self.codes
    }
}

/// 単一書き込み/単一読み出しのスナップショットセル
pub struct SampleCell {
    sequence: AtomicU32,
    codes: [AtomicU16; CHANNEL_COUNT],
}

impl SampleCell {
    pub const fn new() -> Self {
        Self {
            sequence: AtomicU32::new(0),
            codes: [const { AtomicU16::new(0) }; CHANNEL_COUNT],
        }
    }

    /// サンプルセットを丸ごと上書き（割り込みコンテキストから呼ぶ）
    #[inline(always)]
    pub fn publish(&self, sample: &RawSampleSet) {
        let seq = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        for (slot, code) in self.codes.iter().zip(sample.codes.iter()) {
            slot.store(*code, Ordering::Relaxed);
        }

        self.sequence.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// 最新のサンプルセットを取得
    ///
    /// 読み出し中に割り込みで上書きされた場合は読み直す。
    pub fn latest(&self) -> RawSampleSet {
        loop {
            let before = self.sequence.load(Ordering::Acquire);
            if before & 1 == 1 {
                core::hint::spin_loop();
                continue;
            }

            let mut codes = [0u16; CHANNEL_COUNT];
            for (code, slot) in codes.iter_mut().zip(self.codes.iter()) {
                *code = slot.load(Ordering::Relaxed);
            }

            fence(Ordering::Acquire);
            let after = self.sequence.load(Ordering::Relaxed);
            if before == after {
                return RawSampleSet { codes };
            }
        }
    }

    /// これまでに公開されたサンプル数（ラップアラウンドあり）
    pub fn sequence(&self) -> u32 {
        self.sequence.load(Ordering::Acquire) / 2
    }
}

impl Default for SampleCell {
    fn default() -> Self {
        Self::new()
    }
}
