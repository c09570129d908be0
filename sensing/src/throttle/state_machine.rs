//! スロットル安全ステートマシン
//!
//! フィルタ済みスロットル電圧 [V] から 0.0〜1.0 の指令値を生成します。
//!
//! ## 状態遷移
//! ```text
//! Init → Startup → Running ⇄ Fault
//!           └────────────────→ Fault
//! ```
//! - **Startup**: 出力0。不感時間の経過後、電圧が `[dropout, min_default + range_limit]` に
//!   `start_time` tick留まれば Running へ。握ったままならウィンドウをやり直し。
//!   不感時間後の電圧平均を静止電圧として学習し、`min_default ± range_limit` 内なら
//!   `rest_margin` を上乗せして `calibrated_min` に採用（範囲外ならデフォルト値）。
//! - **Running**: `(v - min) / (max - min)` を0〜1にクランプし、上昇側のみスルーレート制限。
//! - **Fault**: 出力0でラッチ。トリガーより狭い帯域に戻ったら Startup からやり直し。
//!
//! tickは `u32` のラップアラウンドを前提に `wrapping_sub` で経過時間を求めます。

use crate::config::ThrottleConfig;

/// スロットル状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThrottleState {
    Init,
    Startup,
    Running,
    Fault,
}

/// ステートマシンの内部状態
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThrottleContext {
    pub state: ThrottleState,
    /// 現在の起動ウィンドウの経過tick
    pub startup_tick_count: u32,
    pub calibrated_min: f32,
    pub calibrated_max: f32,
    /// 1 / (max - min)
    pub scale_factor: f32,
    /// 前回の出力（0.0〜1.0）
    pub last_output: f32,
    /// 制御tickカウンタ（ラップアラウンドあり）
    pub tick: u32,
    /// 起動ウィンドウの開始tick
    pub window_start: u32,
    /// 静止電圧学習: `min_default` からの偏差の積算 [V]
    pub rest_offset_sum: f32,
    /// 静止電圧学習: 積算サンプル数
    pub rest_sample_count: u32,
}

/// スルーレート制限
///
/// 上昇は `last + rate` まで、下降は即時。
#[inline]
pub fn slew_limit(last: f32, target: f32, rate: f32) -> f32 {
    if target > last {
        target.min(last + rate)
    } else {
        target
    }
}

/// スロットル安全ステートマシン
pub struct ThrottleStateMachine {
    config: ThrottleConfig,
    ctx: ThrottleContext,
}

impl ThrottleStateMachine {
    pub fn new(config: &ThrottleConfig) -> Self {
        let min = config.throttle_min_default;
        let max = config.throttle_max_default;
        Self {
            config: *config,
            ctx: ThrottleContext {
                state: ThrottleState::Init,
                startup_tick_count: 0,
                calibrated_min: min,
                calibrated_max: max,
                scale_factor: 1.0 / (max - min),
                last_output: 0.0,
                tick: 0,
                window_start: 0,
                rest_offset_sum: 0.0,
                rest_sample_count: 0,
            },
        }
    }

    pub fn state(&self) -> ThrottleState {
        self.ctx.state
    }

    pub fn context(&self) -> &ThrottleContext {
        &self.ctx
    }

    pub fn last_output(&self) -> f32 {
        self.ctx.last_output
    }

    /// 起動時安全判定の上限電圧
    ///
    /// 学習値ではなくデフォルト最小値を基準にする（学習値のずり上がりを防ぐ）
    fn safe_start(&self) -> f32 {
        self.config.throttle_min_default + self.config.range_limit
    }

    /// 1tick分の更新
    ///
    /// # 引数
    /// * `voltage` - フィルタ済みスロットル電圧 [V]
    ///
    /// # 戻り値
    /// 指令値（0.0〜1.0）
    pub fn update(&mut self, voltage: f32) -> f32 {
        self.ctx.tick = self.ctx.tick.wrapping_add(1);

        let output = match self.ctx.state {
            ThrottleState::Init => {
                self.enter_startup();
                self.startup(voltage);
                0.0
            }
            ThrottleState::Startup => {
                self.startup(voltage);
                0.0
            }
            ThrottleState::Running => match self.running(voltage) {
                Some(target) => slew_limit(self.ctx.last_output, target, self.config.slew_rate),
                // フォルト突入時はスルーレート制限を通さない
                None => 0.0,
            },
            ThrottleState::Fault => {
                self.fault(voltage);
                0.0
            }
        };

        self.ctx.last_output = output;
        output
    }

    /// 外部要因で強制的にフォルトへ（再キャリブレーション等）
    pub fn force_fault(&mut self) {
        if self.ctx.state != ThrottleState::Fault {
            self.enter_fault();
        }
        self.ctx.last_output = 0.0;
    }

    fn enter_startup(&mut self) {
        self.ctx.state = ThrottleState::Startup;
        self.ctx.window_start = self.ctx.tick;
        self.ctx.startup_tick_count = 0;
        self.reset_rest_average();
        info!("Throttle: startup window begins");
    }

    fn reset_rest_average(&mut self) {
        self.ctx.rest_offset_sum = 0.0;
        self.ctx.rest_sample_count = 0;
    }

    /// 学習した静止電圧から最小値とスケールを確定
    fn apply_rest_calibration(&mut self) {
        let default_min = self.config.throttle_min_default;
        let min = if self.ctx.rest_sample_count == 0 {
            default_min
        } else {
            let offset = self.ctx.rest_offset_sum / self.ctx.rest_sample_count as f32;
            if offset.abs() <= self.config.range_limit {
                default_min + offset + self.config.rest_margin
            } else {
                warn!("Throttle: rest voltage {}V out of range, using default", default_min + offset);
                default_min
            }
        };

        self.ctx.calibrated_min = min;
        self.ctx.calibrated_max = self.config.throttle_max_default;
        self.ctx.scale_factor = 1.0 / (self.ctx.calibrated_max - min);
        debug!("Throttle: min={}V, scale={}", min, self.ctx.scale_factor);
    }

    fn enter_fault(&mut self) {
        self.ctx.state = ThrottleState::Fault;
        self.ctx.startup_tick_count = 0;
    }

    fn startup(&mut self, voltage: f32) {
        let elapsed = self.ctx.tick.wrapping_sub(self.ctx.window_start);
        self.ctx.startup_tick_count = elapsed;

        // フィルタ整定中は判定しない
        if elapsed < self.config.start_deadtime {
            return;
        }

        if voltage < self.config.dropout_threshold {
            warn!("Throttle: signal below dropout during startup ({}V)", voltage);
            self.enter_fault();
            return;
        }

        if voltage > self.safe_start() {
            // 握ったまま電源投入 → ウィンドウをやり直す
            debug!("Throttle: held during startup ({}V), restarting window", voltage);
            self.ctx.window_start = self.ctx.tick;
            self.ctx.startup_tick_count = 0;
            self.reset_rest_average();
            return;
        }

        // 偏差で積算して桁落ちを抑える
        self.ctx.rest_offset_sum += voltage - self.config.throttle_min_default;
        self.ctx.rest_sample_count += 1;

        if elapsed >= self.config.start_time {
            self.apply_rest_calibration();
            self.ctx.state = ThrottleState::Running;
            info!("Throttle: running");
        }
    }

    /// `None` はこのtickでフォルトに入ったことを示す
    fn running(&mut self, voltage: f32) -> Option<f32> {
        if voltage < self.config.dropout_threshold {
            error!("Throttle fault: dropout ({}V)", voltage);
            self.enter_fault();
            return None;
        }
        if voltage > self.ctx.calibrated_max + self.config.hysteresis_high {
            error!("Throttle fault: over range ({}V)", voltage);
            self.enter_fault();
            return None;
        }

        let target = (voltage - self.ctx.calibrated_min) * self.ctx.scale_factor;
        Some(target.clamp(0.0, 1.0))
    }

    fn fault(&mut self, voltage: f32) {
        let low = self.config.dropout_threshold + self.config.hysteresis_low;
        if voltage >= low && voltage <= self.ctx.calibrated_max {
            info!("Throttle: signal back in range ({}V), re-arming", voltage);
            self.enter_startup();
            self.startup(voltage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REST_V: f32 = 0.85;
    /// `REST_V` から学習される最小値
    const LEARNED_MIN: f32 = 0.86;

    fn machine() -> ThrottleStateMachine {
        ThrottleStateMachine::new(&ThrottleConfig::default())
    }

    /// 静止電圧でRunningまで進める
    fn running_machine() -> ThrottleStateMachine {
        let mut sm = machine();
        for _ in 0..=ThrottleConfig::default().start_time {
            sm.update(REST_V);
        }
        assert_eq!(sm.state(), ThrottleState::Running);
        sm
    }

    #[test]
    fn test_startup_reaches_running_after_window() {
        let mut sm = machine();
        assert_eq!(sm.state(), ThrottleState::Init);

        for _ in 0..1000 {
            assert_eq!(sm.update(REST_V), 0.0);
            assert_eq!(sm.state(), ThrottleState::Startup);
        }
        // 1001回目で遷移、その回の出力は0
        assert_eq!(sm.update(REST_V), 0.0);
        assert_eq!(sm.state(), ThrottleState::Running);
    }

    #[test]
    fn test_input_ignored_during_deadtime() {
        let mut sm = machine();
        // フィルタ整定中の0V入力は無視される
        for _ in 0..500 {
            sm.update(0.0);
        }
        assert_eq!(sm.state(), ThrottleState::Startup);
        sm.update(0.0);
        assert_eq!(sm.state(), ThrottleState::Fault);
    }

    #[test]
    fn test_held_throttle_restarts_window() {
        let mut sm = machine();
        for _ in 0..800 {
            sm.update(REST_V);
        }
        // 握ったまま
        sm.update(1.5);
        assert_eq!(sm.state(), ThrottleState::Startup);
        assert_eq!(sm.context().startup_tick_count, 0);

        for _ in 0..999 {
            sm.update(REST_V);
            assert_eq!(sm.state(), ThrottleState::Startup);
        }
        sm.update(REST_V);
        assert_eq!(sm.state(), ThrottleState::Running);
    }

    #[test]
    fn test_held_forever_never_runs() {
        let mut sm = machine();
        for _ in 0..10_000 {
            assert_eq!(sm.update(1.2), 0.0);
        }
        assert_eq!(sm.state(), ThrottleState::Startup);
    }

    #[test]
    fn test_dropout_during_startup_faults() {
        let mut sm = machine();
        for _ in 0..600 {
            sm.update(REST_V);
        }
        sm.update(0.5);
        assert_eq!(sm.state(), ThrottleState::Fault);
    }

    #[test]
    fn test_running_maps_voltage_with_slew() {
        let mut sm = running_machine();
        let mut out = 0.0;
        for _ in 0..500 {
            out = sm.update(1.5);
        }
        let expected = (1.5 - LEARNED_MIN) / (2.20 - LEARNED_MIN);
        assert!((out - expected).abs() < 1e-4, "out {}", out);

        // 上限・下限でクランプ
        for _ in 0..1000 {
            out = sm.update(2.2);
        }
        assert!(out > 0.9999 && out <= 1.0, "out {}", out);
        assert_eq!(sm.update(0.8), 0.0);
        assert_eq!(sm.state(), ThrottleState::Running);
    }

    #[test]
    fn test_slew_limits_rise_only() {
        let mut sm = running_machine();
        let span = 2.20 - LEARNED_MIN;
        sm.ctx.last_output = 0.2;
        let out = sm.update(LEARNED_MIN + 0.9 * span);
        assert!((out - 0.20125).abs() < 1e-6, "out {}", out);

        // 下降は即時
        let out = sm.update(LEARNED_MIN + 0.1 * span);
        assert!((out - 0.1).abs() < 1e-5, "out {}", out);

        assert_eq!(slew_limit(0.5, 0.4, 0.01), 0.4);
        assert_eq!(slew_limit(0.5, 0.505, 0.01), 0.505);
        assert!((slew_limit(0.5, 0.9, 0.01) - 0.51).abs() < 1e-6);
    }

    #[test]
    fn test_over_range_faults_with_zero_output() {
        let mut sm = running_machine();
        for _ in 0..1000 {
            sm.update(2.2);
        }
        assert!(sm.last_output() > 0.99);

        // max + hysteresis_high 以内はフォルトにしない
        assert_eq!(sm.update(2.225), 1.0);
        assert_eq!(sm.state(), ThrottleState::Running);

        // スルーレートを通さず即0
        assert_eq!(sm.update(2.24), 0.0);
        assert_eq!(sm.state(), ThrottleState::Fault);
    }

    #[test]
    fn test_dropout_in_running_faults() {
        let mut sm = running_machine();
        for _ in 0..300 {
            sm.update(1.5);
        }
        assert_eq!(sm.update(0.1), 0.0);
        assert_eq!(sm.state(), ThrottleState::Fault);
    }

    #[test]
    fn test_fault_recovery_requires_band_then_full_window() {
        let mut sm = running_machine();
        sm.update(0.1);
        assert_eq!(sm.state(), ThrottleState::Fault);

        // トリガー帯域より狭い範囲でのみ解除
        for v in [0.0, 0.72, 0.74, 2.21, 3.0] {
            assert_eq!(sm.update(v), 0.0);
            assert_eq!(sm.state(), ThrottleState::Fault, "v {}", v);
        }

        sm.update(REST_V);
        assert_eq!(sm.state(), ThrottleState::Startup);
        for _ in 0..999 {
            assert_eq!(sm.update(REST_V), 0.0);
            assert_eq!(sm.state(), ThrottleState::Startup);
        }
        sm.update(REST_V);
        assert_eq!(sm.state(), ThrottleState::Running);
    }

    #[test]
    fn test_rest_offset_learned_as_min() {
        let mut sm = machine();
        for _ in 0..5000 {
            assert_eq!(sm.update(0.89), 0.0);
        }
        assert_eq!(sm.state(), ThrottleState::Running);
        assert!((sm.context().calibrated_min - 0.90).abs() < 1e-4);
        let expected_scale = 1.0 / (2.20 - 0.90);
        assert!((sm.context().scale_factor - expected_scale).abs() < 1e-3);

        // 不感幅内の揺らぎでは指令を出さない
        assert_eq!(sm.update(0.895), 0.0);

        let mut out = 0.0;
        for _ in 0..1000 {
            out = sm.update(1.5);
        }
        let expected = (1.5 - 0.90) / (2.20 - 0.90);
        assert!((out - expected).abs() < 1e-3, "out {}", out);
    }

    #[test]
    fn test_low_rest_voltage_learned() {
        let mut sm = machine();
        for _ in 0..=1000 {
            sm.update(0.81);
        }
        assert_eq!(sm.state(), ThrottleState::Running);
        assert!((sm.context().calibrated_min - 0.82).abs() < 1e-4);
        assert_eq!(sm.update(0.81), 0.0);
    }

    #[test]
    fn test_rest_average_out_of_range_falls_back_to_default() {
        let mut sm = machine();
        // 不感時間後はドロップアウトより上、しかし学習範囲外
        for _ in 0..=1000 {
            sm.update(0.78);
        }
        assert_eq!(sm.state(), ThrottleState::Running);
        assert_eq!(sm.context().calibrated_min, 0.85);
    }

    #[test]
    fn test_rest_average_restarts_with_window() {
        let mut sm = machine();
        for _ in 0..800 {
            sm.update(0.81);
        }
        sm.update(1.5);
        for _ in 0..1000 {
            sm.update(0.88);
        }
        assert_eq!(sm.state(), ThrottleState::Running);
        // 握る前の積算は破棄されている
        assert!((sm.context().calibrated_min - 0.89).abs() < 1e-4);
    }

    #[test]
    fn test_fault_recovery_relearns_min() {
        let mut sm = running_machine();
        sm.update(0.1);
        assert_eq!(sm.state(), ThrottleState::Fault);
        for _ in 0..=1000 {
            sm.update(0.87);
        }
        assert_eq!(sm.state(), ThrottleState::Running);
        assert!((sm.context().calibrated_min - 0.88).abs() < 1e-4);
    }

    #[test]
    fn test_force_fault() {
        let mut sm = running_machine();
        for _ in 0..300 {
            sm.update(1.5);
        }
        sm.force_fault();
        assert_eq!(sm.state(), ThrottleState::Fault);
        assert_eq!(sm.last_output(), 0.0);
        assert_eq!(sm.update(1.5), 0.0);
    }

    #[test]
    fn test_window_timing_across_tick_wraparound() {
        let mut sm = machine();
        sm.ctx.tick = u32::MAX - 300;
        for _ in 0..1000 {
            sm.update(REST_V);
            assert_eq!(sm.state(), ThrottleState::Startup);
        }
        sm.update(REST_V);
        assert_eq!(sm.state(), ThrottleState::Running);
        assert!(sm.context().tick < 1000);
    }

    #[test]
    fn test_output_always_in_unit_range() {
        let mut sm = machine();
        for i in 0..20_000u32 {
            // 三角波 0〜3.3V
            let phase = (i % 660) as f32 / 330.0;
            let v = if phase < 1.0 { phase * 3.3 } else { (2.0 - phase) * 3.3 };
            let out = sm.update(v);
            assert!((0.0..=1.0).contains(&out), "out {} at v {}", out, v);
        }
    }
}
