//! 套接字与重连配置。
//!
//! 退避节奏与沉降窗口在源行为中是运维调参常量而非语义契约，因此全部
//! 以显式配置结构暴露默认值，调用方可按部署环境覆盖。

use std::time::Duration;

/// 单个套接字的行为配置。
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// 发送侧高水位：单管道排队未投递消息的上限，达到后该管道报告“满”。
    pub send_hwm: usize,
    /// 接收侧高水位：单管道排队未消费消息的上限，达到后停止从传输读取。
    pub recv_hwm: usize,
    /// 连接器的重试退避参数。
    pub reconnect: ReconnectConfig,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            send_hwm: 1000,
            recv_hwm: 1000,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// 连接器重试的退避参数。
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// 首次失败后的等待时长。
    pub initial_delay: Duration,
    /// 退避上限，指数翻倍到此封顶。
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// 指数退避状态机。
///
/// # 教案式说明
/// - **意图 (Why)**：连接器的瞬时建连失败不向 connect 调用方暴露，而是进入
///   重试态；退避节奏集中在此处管理，连接成功后归零；
/// - **契约 (What)**：
///   - [`Backoff::next_delay`] 返回本次应等待的时长并推进内部状态，
///     序列为 `initial, initial*2, initial*4, ...` 封顶于 `max_delay`；
///   - [`Backoff::reset`] 在连接成功后调用，使下一次失败重新从
///     `initial_delay` 开始；
/// - **取舍 (Trade-offs)**：未引入抖动（jitter）——单套接字对单地址重试，
///   不存在群体同步唤醒问题。
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    failure_count: u32,
}

impl Backoff {
    /// 按配置构造，初始处于未退避状态。
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            initial: config.initial_delay,
            max: config.max_delay,
            current: config.initial_delay,
            failure_count: 0,
        }
    }

    /// 记录一次失败，返回重试前应等待的时长。
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        self.failure_count = self.failure_count.saturating_add(1);
        delay
    }

    /// 连续失败次数，供日志观测。
    pub fn failures(&self) -> u32 {
        self.failure_count
    }

    /// 连接成功后复位到初始节奏。
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.failure_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(450),
        };
        let mut backoff = Backoff::new(&config);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        // 封顶后保持在 max_delay。
        assert_eq!(backoff.next_delay(), Duration::from_millis(450));
        assert_eq!(backoff.next_delay(), Duration::from_millis(450));
        assert_eq!(backoff.failures(), 5);
    }

    #[test]
    fn backoff_reset_restores_initial_pace() {
        let config = ReconnectConfig::default();
        let mut backoff = Backoff::new(&config);
        let first = backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.next_delay(), first);
    }
}
