//! ハードウェアアクセス層
//!
//! アルゴリズム側が使う操作だけを切り出したトレイト。
//! ファームウェアではPACによるレジスタ操作、テストではシミュレーションで実装します。

use crate::channel_map::{AdcChannelMap, AdcUnit};

/// 割り込みハンドラから使うインジェクテッド結果の読み出し
///
/// 実装はレジスタ読み出しのみとし、ブロックや浮動小数点演算を含めないこと。
pub trait InjectedResults {
    /// インジェクテッドデータレジスタ（slot: 0 = JDR1）を読む
    fn read_injected(&self, unit: AdcUnit, slot: usize) -> u16;

    /// 変換完了フラグをクリア
    fn acknowledge(&self);
}

/// 初期化・キャリブレーション用のADC操作
pub trait AdcHardware: InjectedResults {
    /// 3ユニットをスキャン+インジェクテッドモードに設定（トリガーはまだ無効）
    fn configure_sequences(&mut self, map: &AdcChannelMap);

    /// レギュラー変換チャネルを切り替え
    fn select_regular_channel(&mut self, unit: AdcUnit, hw_channel: u8);

    /// マスターユニットのソフトウェアトリガー（全ユニット同時変換）
    fn start_regular_conversion(&mut self);

    /// レギュラー変換完了（EOC）
    fn regular_conversion_done(&self) -> bool;

    /// レギュラー変換結果を読み出す（EOCはマスター読み出しでクリア）
    fn read_regular(&mut self, unit: AdcUnit) -> u16;

    /// 工場書き込みのVrefint校正値
    fn vrefint_calibration_word(&self) -> u16;

    /// PWMタイマートリガーとインジェクテッド完了割り込みを有効化
    fn arm_injected_trigger(&mut self);

    /// 単調増加するtickカウンタ（ラップアラウンドあり）
    fn now_ticks(&self) -> u32;
}
