//! 同期ADC取得
//!
//! 3つのADCユニットをPWMタイマーのトリガーで同時にインジェクテッド変換させ、
//! 完了割り込みで全チャネルを1つの `RawSampleSet` として `SampleCell` へ公開します。
//!
//! ## 動作
//! 1. `initialize()` でスキャン+インジェクテッドモードと3スロットのシーケンスを設定
//! 2. タイマーTRGOの立ち上がりで3ユニットが同時に変換開始（ソフトウェア介在なし）
//! 3. JEOC割り込みで `on_conversion_complete()` がJDR1..JDR3を読み出して公開
//!
//! 割り込み側は整数演算のみ。前回のサンプルは上書きされ、キューイングはしません。

use crate::channel_map::{AdcChannelMap, CHANNEL_COUNT, INJECTED_SLOTS};
use crate::config::ADC_MAX_CODE;
use crate::hal::{AdcHardware, InjectedResults};
use crate::sample::{RawSampleSet, SampleCell};

/// 同期ADC取得
pub struct AdcAcquisition {
    map: AdcChannelMap,
}

impl AdcAcquisition {
    pub const fn new(map: AdcChannelMap) -> Self {
        Self { map }
    }

    pub fn map(&self) -> &AdcChannelMap {
        &self.map
    }

    /// ADCユニットのシーケンスを設定
    ///
    /// トリガーと割り込みはキャリブレーション完了後に `arm()` で有効化する。
    pub fn initialize<H: AdcHardware>(&self, hw: &mut H) {
        info!("Configuring ADC1/2/3 for simultaneous injected conversion");
        hw.configure_sequences(&self.map);
        for seq in self.map.units.iter() {
            debug!(
                "  {}: injected ch {} / {} / {}",
                seq.unit,
                seq.injected[0].hw_channel,
                seq.injected[1].hw_channel,
                seq.injected[2].hw_channel
            );
        }
    }

    /// PWMトリガーとJEOC割り込みを有効化
    pub fn arm<H: AdcHardware>(&self, hw: &mut H) {
        hw.arm_injected_trigger();
        info!("Injected conversion armed on PWM trigger");
    }

    /// インジェクテッド結果から生サンプルセットを組み立てる
    ///
    /// 同じ論理チャネルに複数スロットが割り当てられている場合は整数平均。
    #[inline(always)]
    pub fn capture<R: InjectedResults + ?Sized>(&self, regs: &R) -> RawSampleSet {
        let mut sums = [0u32; CHANNEL_COUNT];
        let mut counts = [0u32; CHANNEL_COUNT];

        for seq in self.map.units.iter() {
            for slot in 0..INJECTED_SLOTS {
                let signal = seq.injected[slot].signal.index();
                sums[signal] += (regs.read_injected(seq.unit, slot) & ADC_MAX_CODE) as u32;
                counts[signal] += 1;
            }
        }

        let mut codes = [0u16; CHANNEL_COUNT];
        for i in 0..CHANNEL_COUNT {
            if counts[i] > 0 {
                codes[i] = (sums[i] / counts[i]) as u16;
            }
        }
        RawSampleSet::from_codes(codes)
    }

    /// インジェクテッド変換完了割り込みの本体
    #[inline(always)]
    pub fn on_conversion_complete<R: InjectedResults + ?Sized>(
        &self,
        regs: &R,
        cell: &SampleCell,
    ) {
        let sample = self.capture(regs);
        regs.acknowledge();
        cell.publish(&sample);
    }
}
