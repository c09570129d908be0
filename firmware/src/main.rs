#![no_std]
#![no_main]

mod adc_irq;
mod config;
mod fmt;
mod hardware;
mod state;
mod tasks;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use embassy_executor::Spawner;
use embassy_stm32::timer::{
    complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin},
    low_level::CountingMode,
    simple_pwm::PwmPin,
    Channel,
};
use embassy_time::{Duration, Timer};

use ebike_sensing::{AdcChannelMap, SensingConfig, SensorFrontend};

use fmt::*;
use hardware::Stm32Adc;
use tasks::throttle_task;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // ハードウェア初期化
    let config = hardware::create_clock_config();
    let p = embassy_stm32::init(config);

    info!("═══════════════════════════════════════════════════════════════════");
    info!("");
    info!("        e-bike Controller Sensing Front End");
    info!("        STM32F405RG @ 168MHz • ADC1/2/3 triple simultaneous");
    info!("");
    info!("═══════════════════════════════════════════════════════════════════");

    // アナログ入力ピン設定
    unsafe {
        hardware::init_analog_pins();
    }

    // PWM初期化（TIM1、3相相補PWM）
    // 出力はモーター制御側が有効化する。ここではADCトリガー源としてカウンタを動かす
    let mut uvw_pwm = ComplementaryPwm::new(
        p.TIM1,
        Some(PwmPin::new(
            p.PA8,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PB13,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(PwmPin::new(
            p.PA9,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PB14,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(PwmPin::new(
            p.PA10,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PB15,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        None,
        None,
        config::pwm::DEFAULT_FREQUENCY,
        CountingMode::EdgeAlignedUp,
    );
    uvw_pwm.disable(Channel::Ch1);
    uvw_pwm.disable(Channel::Ch2);
    uvw_pwm.disable(Channel::Ch3);
    uvw_pwm.set_dead_time(config::pwm::DEFAULT_DEAD_TIME);

    // TIM1 OC4REF → TRGO（ADCインジェクテッド変換トリガー）
    unsafe {
        hardware::init_adc_trigger();
    }

    // センサーフロントエンド初期化（ブロッキングでキャリブレーション）
    let adc = Stm32Adc::new(p.ADC1, p.ADC2, p.ADC3);
    let sensing_config = SensingConfig::default();
    let mut frontend = SensorFrontend::new(
        adc,
        &sensing_config,
        &AdcChannelMap::DEFAULT,
        &adc_irq::SAMPLES,
    );

    match frontend.initialize() {
        Ok(()) => {
            let cal = frontend.calibration();
            info!(
                "Calibration: null={}/{}/{}, Vref={}V, Vrefint={}V (factory: {})",
                cal.current_null[0],
                cal.current_null[1],
                cal.current_null[2],
                cal.vref,
                cal.vrefint,
                cal.vrefint_from_factory
            );

            // スロットル処理タスクを起動
            spawner.spawn(throttle_task(frontend)).unwrap();
        }
        Err(e) => {
            // トリガー未有効化のまま。スロットル指令は0のまま
            error!("ADC calibration failed: {}, throttle disabled", e);
        }
    }

    // メインループ（PWMタイマーを保持）
    loop {
        Timer::after(Duration::from_millis(100)).await;
    }
}
