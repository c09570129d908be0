//! ハードウェア初期化とADCレジスタアクセス
//!
//! ## ハードウェア構成（STM32F405）
//! - ADC1/2/3: トリプル同時モード（レギュラー+インジェクテッド同時）
//! - トリガー: TIM1 TRGO（OC4REF）立ち上がり → 3ユニット同時にインジェクテッド変換
//! - アナログ入力:
//!   - PC0 (IN10): Ia / PC1 (IN11): Ib / PC2 (IN12): Ic
//!   - PC3 (IN13): Vbus / PC5 (IN15): Throttle1
//!   - PB0 (IN8): Throttle2 / PB1 (IN9): 温度
//!   - IN17: 内部基準電圧（Vrefint）
//! - ADCクロック: PCLK2 84MHz / 4 = 21MHz

use embassy_stm32::pac;
use embassy_stm32::pac::adc::vals::{Exten, Res, SampleTime};
use embassy_stm32::pac::adccommon::vals::{Adcpre, Multi};
use embassy_stm32::peripherals;
use embassy_stm32::time::Hertz;
use embassy_stm32::{Config, Peri};
use embassy_time::Instant;

use ebike_sensing::channel_map::{AdcChannelMap, INJECTED_SLOTS};
use ebike_sensing::{AdcHardware, AdcUnit, InjectedResults};

use crate::config::{adc, pwm};
use crate::fmt::*;

/// CCR.MULTI: トリプルモード、レギュラー同時+インジェクテッド同時
const MULTI_TRIPLE_REG_SIMULT_INJ_SIMULT: u8 = 0b10001;

/// CR2.JEXTSEL: TIM1 TRGO
const JEXTSEL_TIM1_TRGO: u8 = 0b0001;

/// インジェクテッドスロットごとのサンプリング時間
/// 同時変換では同じスロット位置の変換時間を揃える必要がある
/// - スロット0（相電流、アンプ出力で低インピーダンス）: 15サイクル
/// - スロット1, 2: Vrefint（ADC1）と分圧入力のため144サイクルに揃える
const INJECTED_SAMPLE_TIME: [SampleTime; INJECTED_SLOTS] = [
    SampleTime::CYCLES15,
    SampleTime::CYCLES144,
    SampleTime::CYCLES144,
];

/// クロック設定を作成（HSE 8MHz → PLL → 168MHz）
pub fn create_clock_config() -> Config {
    use embassy_stm32::rcc::*;

    let mut config = embassy_stm32::Config::default();
    config.rcc.hse = Some(Hse {
        freq: Hertz(8_000_000),
        mode: HseMode::Oscillator,
    });
    config.rcc.pll_src = PllSource::HSE;
    config.rcc.pll = Some(Pll {
        prediv: PllPreDiv::DIV4,   // 8MHz / 4 = 2MHz
        mul: PllMul::MUL168,       // 2MHz * 168 = 336MHz
        divp: Some(PllPDiv::DIV2), // 336MHz / 2 = 168MHz (SYSCLK)
        divq: Some(PllQDiv::DIV7), // 336MHz / 7 = 48MHz
        divr: None,
    });
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV4; // 42MHz
    config.rcc.apb2_pre = APBPrescaler::DIV2; // 84MHz（ADC, TIM1）
    config.rcc.sys = Sysclk::PLL1_P;
    config
}

#[inline(always)]
fn regs(unit: AdcUnit) -> pac::adc::Adc {
    match unit {
        AdcUnit::Adc1 => pac::ADC1,
        AdcUnit::Adc2 => pac::ADC2,
        AdcUnit::Adc3 => pac::ADC3,
    }
}

fn set_sample_time(adc: pac::adc::Adc, hw_channel: u8, time: SampleTime) {
    if hw_channel < 10 {
        adc.smpr2()
            .modify(|w| w.set_smp(hw_channel as usize, time));
    } else {
        adc.smpr1()
            .modify(|w| w.set_smp((hw_channel - 10) as usize, time));
    }
}

/// アナログ入力ピンの設定
///
/// # Safety
/// PACを使用した直接的なレジスタ操作を含むため、unsafe
pub unsafe fn init_analog_pins() {
    let rcc = pac::RCC;
    let gpiob = pac::GPIOB;
    let gpioc = pac::GPIOC;

    rcc.ahb1enr().modify(|w| {
        w.set_gpioben(true);
        w.set_gpiocen(true);
    });

    // PC0/PC1/PC2/PC3/PC5: アナログモード
    for pin in [0, 1, 2, 3, 5] {
        gpioc
            .moder()
            .modify(|w| w.set_moder(pin, pac::gpio::vals::Moder::ANALOG));
        gpioc
            .pupdr()
            .modify(|w| w.set_pupdr(pin, pac::gpio::vals::Pupdr::FLOATING));
    }

    // PB0/PB1: アナログモード
    for pin in [0, 1] {
        gpiob
            .moder()
            .modify(|w| w.set_moder(pin, pac::gpio::vals::Moder::ANALOG));
        gpiob
            .pupdr()
            .modify(|w| w.set_pupdr(pin, pac::gpio::vals::Pupdr::FLOATING));
    }
}

/// TIM1 CH4コンペアをTRGOに出力し、ADCトリガーとする
///
/// `ComplementaryPwm` の初期化後に呼ぶこと（ARR確定後）。
///
/// # Safety
/// PACを使用した直接的なレジスタ操作を含むため、unsafe
pub unsafe fn init_adc_trigger() {
    let tim1 = pac::TIM1;

    let arr = tim1.arr().read().arr() as u32;
    let compare = (arr as f32 * pwm::ADC_TRIGGER_RATIO) as u16;

    // CH4: PWMモード1（出力ピンなし、OC4REFのみ使用）
    tim1.ccmr_output(1)
        .modify(|w| w.set_ocm(1, pac::timer::vals::Ocm::PWM_MODE1));
    tim1.ccr(3).modify(|w| w.set_ccr(compare));

    // CR2.MMS = OC4REF → TRGO
    tim1.cr2()
        .modify(|w| w.set_mms(pac::timer::vals::Mms::COMPARE_OC4));

    info!("ADC trigger: TIM1 OC4REF at {}/{}", compare, arr);
}

/// ISRから使うインジェクテッド結果の読み出し（状態を持たない）
pub struct InjectedRegs;

impl InjectedResults for InjectedRegs {
    #[inline(always)]
    fn read_injected(&self, unit: AdcUnit, slot: usize) -> u16 {
        regs(unit).jdr(slot).read().jdata()
    }

    #[inline(always)]
    fn acknowledge(&self) {
        // 全ユニットのJEOC/JSTRTをクリア（rc_w0）
        for unit in AdcUnit::ALL {
            regs(unit).sr().modify(|w| {
                w.set_jeoc(false);
                w.set_jstrt(false);
            });
        }
    }
}

/// STM32F405のADC1/2/3
pub struct Stm32Adc {
    _adc1: Peri<'static, peripherals::ADC1>,
    _adc2: Peri<'static, peripherals::ADC2>,
    _adc3: Peri<'static, peripherals::ADC3>,
}

impl Stm32Adc {
    pub fn new(
        adc1: Peri<'static, peripherals::ADC1>,
        adc2: Peri<'static, peripherals::ADC2>,
        adc3: Peri<'static, peripherals::ADC3>,
    ) -> Self {
        Self {
            _adc1: adc1,
            _adc2: adc2,
            _adc3: adc3,
        }
    }
}

impl InjectedResults for Stm32Adc {
    #[inline(always)]
    fn read_injected(&self, unit: AdcUnit, slot: usize) -> u16 {
        InjectedRegs.read_injected(unit, slot)
    }

    #[inline(always)]
    fn acknowledge(&self) {
        InjectedRegs.acknowledge()
    }
}

impl AdcHardware for Stm32Adc {
    fn configure_sequences(&mut self, map: &AdcChannelMap) {
        let rcc = pac::RCC;
        rcc.apb2enr().modify(|w| {
            w.set_adc1en(true);
            w.set_adc2en(true);
            w.set_adc3en(true);
        });

        // 共通設定: 21MHz、温度センサー/Vrefint有効、トリプル同時モード
        pac::ADC123_COMMON.ccr().modify(|w| {
            w.set_adcpre(Adcpre::DIV4);
            w.set_tsvrefe(true);
            w.set_multi(Multi::from_bits(MULTI_TRIPLE_REG_SIMULT_INJ_SIMULT));
        });

        for seq in map.units.iter() {
            let adc = regs(seq.unit);

            adc.cr2().modify(|w| w.set_adon(false));
            adc.cr1().modify(|w| {
                w.set_res(Res::BITS12);
                w.set_scan(true);
                w.set_jeocie(false);
            });

            for (slot, binding) in seq.injected.iter().enumerate() {
                set_sample_time(adc, binding.hw_channel, INJECTED_SAMPLE_TIME[slot]);
            }
            set_sample_time(adc, seq.regular.hw_channel, INJECTED_SAMPLE_TIME[0]);

            // レギュラー: 1変換（キャリブレーション用）
            adc.sqr1().modify(|w| w.set_l(0));
            adc.sqr3().modify(|w| w.set_sq(0, seq.regular.hw_channel));

            // インジェクテッド: 3変換、JL=2のときJSQ2..JSQ4が順に変換されJDR1..JDR3へ
            adc.jsqr().write(|w| {
                w.set_jl((INJECTED_SLOTS - 1) as u8);
                for (slot, binding) in seq.injected.iter().enumerate() {
                    w.set_jsq(slot + 1, binding.hw_channel);
                }
            });

            adc.sr().write(|w| w.0 = 0);
            adc.cr2().modify(|w| w.set_adon(true));
        }
    }

    fn select_regular_channel(&mut self, unit: AdcUnit, hw_channel: u8) {
        regs(unit).sqr3().modify(|w| w.set_sq(0, hw_channel));
    }

    fn start_regular_conversion(&mut self) {
        // マルチモードではマスターのSWSTARTで全ユニットが同時に変換
        let master = regs(AdcUnit::MASTER);
        master.sr().modify(|w| w.set_eoc(false));
        master.cr2().modify(|w| w.set_swstart(true));
    }

    fn regular_conversion_done(&self) -> bool {
        regs(AdcUnit::MASTER).sr().read().eoc()
    }

    fn read_regular(&mut self, unit: AdcUnit) -> u16 {
        regs(unit).dr().read().data()
    }

    fn vrefint_calibration_word(&self) -> u16 {
        // システムメモリの工場校正値（読み出し専用）
        unsafe { core::ptr::read_volatile(adc::VREFINT_CAL_ADDR as *const u16) }
    }

    fn arm_injected_trigger(&mut self) {
        let master = regs(AdcUnit::MASTER);

        // マルチモードではマスターのトリガー設定のみ有効
        master.cr2().modify(|w| {
            w.set_jextsel(JEXTSEL_TIM1_TRGO);
            w.set_jexten(Exten::RISING_EDGE);
        });
        master.sr().modify(|w| w.set_jeoc(false));
        master.cr1().modify(|w| w.set_jeocie(true));

        // ADC割り込み有効化（NVIC）
        // Embassyタスクより高優先度にする
        unsafe {
            cortex_m::peripheral::NVIC::unmask(pac::Interrupt::ADC);
            let mut cp = cortex_m::Peripherals::steal();
            cp.NVIC.set_priority(pac::Interrupt::ADC, adc::IRQ_PRIORITY);
        }
    }

    fn now_ticks(&self) -> u32 {
        // 1ms単位、ラップアラウンドは呼び出し側で処理
        Instant::now().as_millis() as u32
    }
}
