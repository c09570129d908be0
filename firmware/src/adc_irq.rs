//! ADCインジェクテッド変換完了割り込み
//!
//! TIM1 TRGOで3ユニットが同時変換を終えるとADC割り込み（JEOC）が発生し、
//! 全チャネルを `SAMPLES` へ公開します。制御ループ側は `SAMPLES.latest()` で読み出します。

use core::sync::atomic::{AtomicU32, Ordering};

use ebike_sensing::{AdcAcquisition, AdcChannelMap, SampleCell};

use crate::hardware::InjectedRegs;

/// ISR → 制御ループのサンプル受け渡しセル
pub static SAMPLES: SampleCell = SampleCell::new();

/// 割り込みハンドラが使うチャネル割り当て
static ACQUISITION: AdcAcquisition = AdcAcquisition::new(AdcChannelMap::DEFAULT);

/// 割り込み回数 - デバッグ用
pub static IRQ_COUNT: AtomicU32 = AtomicU32::new(0);

/// ADC割り込みハンドラー本体
///
/// # Safety
/// 割り込みコンテキストで実行されるため、処理は最小限にする（整数演算のみ）
#[inline(always)]
pub unsafe fn adc_irq_handler() {
    ACQUISITION.on_conversion_complete(&InjectedRegs, &SAMPLES);
    IRQ_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// ADC割り込みのRust側エントリーポイント
/// ベクタテーブルのADC（ADC1/2/3共通）に登録される
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn ADC() {
    adc_irq_handler();
}

/// 割り込み回数を取得
#[inline(always)]
pub fn irq_count() -> u32 {
    IRQ_COUNT.load(Ordering::Relaxed)
}
