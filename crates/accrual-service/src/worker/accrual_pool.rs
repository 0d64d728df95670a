//! 积分处理 Worker 池
//!
//! 单个调度器按固定间隔从订单存储拉取待处理订单（NEW / PROCESSING，
//! 上传时间最早的优先），通过有界任务队列分发给固定数量的 Worker。
//! 调度器等待本批所有订单回报后才进入下一轮，同一订单不会被两个 Worker 同时持有。
//!
//! ## 限流冷却
//!
//! 积分服务的限流作用于整个客户端身份，因此冷却是池级别的：
//! 调度器持有唯一的"恢复时间点"（单写者），通过 watch 通道发布给 Worker（只读）。
//! 冷却期内调度器不派发新批次，Worker 跳过已排队但未开始的订单。
//!
//! ## 重试
//!
//! 传输错误、限流、存储失败都不修改订单状态，订单在下一轮被重新拉取，
//! 状态本身就是重试机制，不维护重试计数。

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use loyalty_shared::config::{AccrualConfig, WorkerConfig};
use loyalty_shared::error::LoyaltyError;
use loyalty_shared::observability::metrics;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::client::{AccrualClient, MAX_RETRY_AFTER};
use crate::error::AccrualError;
use crate::models::{AccrualResponse, AccrualStatus, AccrualVerdict, Order, OrderStatus};
use crate::repository::OrderRepositoryTrait;

const WORKER_NAME: &str = "accrual_pool";

// ===== 配置 =====

/// 默认 Worker 数量
pub const DEFAULT_WORKERS: usize = 5;
/// 默认调度间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// 默认每轮拉取上限
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// 默认单次查询超时
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Worker 池配置
///
/// 任一字段为 0 时使用对应的默认值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// 从应用配置构建
    pub fn from_settings(worker: &WorkerConfig, accrual: &AccrualConfig) -> Self {
        Self {
            workers: worker.workers,
            poll_interval: Duration::from_millis(worker.poll_interval_ms),
            batch_size: worker.batch_size,
            request_timeout: Duration::from_millis(accrual.request_timeout_ms),
        }
        .normalized()
    }

    /// 将 0 值替换为默认值
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            workers: non_zero_or(self.workers, defaults.workers),
            poll_interval: if self.poll_interval.is_zero() {
                defaults.poll_interval
            } else {
                self.poll_interval
            },
            batch_size: non_zero_or(self.batch_size, defaults.batch_size),
            request_timeout: if self.request_timeout.is_zero() {
                defaults.request_timeout
            } else {
                self.request_timeout
            },
        }
    }
}

fn non_zero_or(value: usize, default: usize) -> usize {
    if value == 0 { default } else { value }
}

// ===== 单订单结果 =====

/// 单个订单在本轮的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    /// 已结案为 PROCESSED 并入账
    Processed,
    /// 已结案为 INVALID
    Invalid,
    /// 积分服务尚未给出结论，订单保持 PROCESSING
    Pending,
    /// 订单已被其他调度轮次结案，写入被忽略
    AlreadyFinalized,
    /// 积分服务限流，需要池级冷却
    RateLimited(Duration),
    /// 传输错误，订单留待下一轮
    TransportError,
    /// 存储写入失败，订单留待下一轮
    StoreError,
    /// 冷却或关闭期间未开始处理
    Skipped,
}

/// 单轮调度统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 本轮从存储拉取的订单数
    pub selected: usize,
    pub processed: usize,
    pub invalid: usize,
    pub pending: usize,
    pub already_finalized: usize,
    /// 传输错误与存储失败
    pub failed: usize,
    /// 未派发或被 Worker 跳过的订单
    pub skipped: usize,
    /// 本轮收到的最长限流冷却
    pub rate_limited: Option<Duration>,
}

impl CycleReport {
    fn record(&mut self, outcome: OrderOutcome) {
        match outcome {
            OrderOutcome::Processed => self.processed += 1,
            OrderOutcome::Invalid => self.invalid += 1,
            OrderOutcome::Pending => self.pending += 1,
            OrderOutcome::AlreadyFinalized => self.already_finalized += 1,
            OrderOutcome::RateLimited(retry_after) => {
                self.rate_limited = Some(
                    self.rate_limited
                        .map_or(retry_after, |current| current.max(retry_after)),
                );
            }
            OrderOutcome::TransportError | OrderOutcome::StoreError => self.failed += 1,
            OrderOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Worker 回报给调度器的结果
#[derive(Debug)]
struct JobReport {
    number: String,
    outcome: OrderOutcome,
}

// ===== Worker 侧 =====

/// Worker 共享的只读上下文
struct WorkerContext<R, C> {
    repo: Arc<R>,
    client: Arc<C>,
    request_timeout: Duration,
}

impl<R, C> WorkerContext<R, C>
where
    R: OrderRepositoryTrait,
    C: AccrualClient,
{
    /// 处理单个订单
    async fn process_order(
        &self,
        order: &Order,
        resume_at: &watch::Receiver<Option<Instant>>,
    ) -> OrderOutcome {
        let number = order.number.as_str();

        if order.status == OrderStatus::New {
            match self.repo.mark_processing(number).await {
                Ok(()) => {}
                Err(e) if e.is_finalize_conflict() => {
                    debug!(order_number = number, "订单已结案，跳过");
                    return OrderOutcome::AlreadyFinalized;
                }
                Err(e) => {
                    error!(order_number = number, error = %e, "标记订单 PROCESSING 失败");
                    return OrderOutcome::StoreError;
                }
            }
        }

        if is_cooling_down(resume_at) {
            debug!(order_number = number, "限流冷却中，跳过订单");
            return OrderOutcome::Skipped;
        }

        let started = Instant::now();
        let response = match tokio::time::timeout(
            self.request_timeout,
            self.client.fetch_accrual(number),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AccrualError::timeout(self.request_timeout)),
        };
        let elapsed = started.elapsed().as_secs_f64();

        match response {
            Err(e) => {
                metrics::record_accrual_request(e.outcome(), elapsed);
                let err = LoyaltyError::from(e);
                warn!(
                    order_number = number,
                    error = %err,
                    code = err.code(),
                    "查询积分服务失败，订单留待下一轮"
                );
                OrderOutcome::TransportError
            }
            Ok(AccrualResponse::RateLimited { retry_after }) => {
                metrics::record_accrual_request("rate_limited", elapsed);
                OrderOutcome::RateLimited(retry_after.min(MAX_RETRY_AFTER))
            }
            Ok(AccrualResponse::Verdict(verdict)) => {
                metrics::record_accrual_request("verdict", elapsed);
                self.apply_verdict(order, verdict).await
            }
        }
    }

    async fn apply_verdict(&self, order: &Order, verdict: AccrualVerdict) -> OrderOutcome {
        let number = order.number.as_str();

        let (result, outcome, status) = match verdict.status {
            AccrualStatus::Registered | AccrualStatus::Processing | AccrualStatus::Unknown => {
                debug!(
                    order_number = number,
                    verdict = verdict.status.as_str(),
                    "积分尚未计算完成"
                );
                return OrderOutcome::Pending;
            }
            AccrualStatus::Invalid => (
                self.repo.mark_invalid(number).await,
                OrderOutcome::Invalid,
                OrderStatus::Invalid,
            ),
            AccrualStatus::Processed => (
                self.repo
                    .mark_processed_and_credit(number, verdict.accrual_amount(), &order.user_id)
                    .await,
                OrderOutcome::Processed,
                OrderStatus::Processed,
            ),
        };

        match result {
            Ok(()) => {
                metrics::record_order_finalized(status.as_str());
                info!(
                    order_number = number,
                    user_id = %order.user_id,
                    status = status.as_str(),
                    accrual = %verdict.accrual_amount(),
                    "订单已结案"
                );
                outcome
            }
            Err(e) if e.is_finalize_conflict() => {
                debug!(order_number = number, "订单已被其他轮次结案，忽略本次写入");
                OrderOutcome::AlreadyFinalized
            }
            Err(e) => {
                error!(order_number = number, error = %e, "写入订单结论失败");
                OrderOutcome::StoreError
            }
        }
    }
}

/// 等待关闭信号，发送端被丢弃也视为关闭
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn is_cooling_down(resume_at: &watch::Receiver<Option<Instant>>) -> bool {
    resume_at
        .borrow()
        .is_some_and(|resume_at| Instant::now() < resume_at)
}

/// Worker 主循环：从共享队列取订单，处理后回报，直到队列关闭
async fn worker_loop<R, C>(
    id: usize,
    ctx: Arc<WorkerContext<R, C>>,
    jobs: Arc<Mutex<mpsc::Receiver<Order>>>,
    reports: mpsc::Sender<JobReport>,
    resume_at: watch::Receiver<Option<Instant>>,
    shutdown: watch::Receiver<bool>,
) where
    R: OrderRepositoryTrait,
    C: AccrualClient,
{
    debug!(worker_id = id, "Worker 已启动");

    loop {
        let job = jobs.lock().await.recv().await;
        let Some(order) = job else {
            break;
        };

        let outcome = if *shutdown.borrow() {
            OrderOutcome::Skipped
        } else {
            ctx.process_order(&order, &resume_at).await
        };

        let report = JobReport {
            number: order.number,
            outcome,
        };
        if reports.send(report).await.is_err() {
            break;
        }
    }

    debug!(worker_id = id, "Worker 已退出");
}

/// 一组运行中的 Worker 及其通道
struct WorkerSet {
    jobs: mpsc::Sender<Order>,
    reports: mpsc::Receiver<JobReport>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerSet {
    /// 关闭任务队列并等待所有 Worker 退出
    async fn join(self) {
        let Self {
            jobs,
            reports,
            handles,
        } = self;
        drop(jobs);
        drop(reports);

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Worker 异常退出");
            }
        }
    }
}

// ===== 调度器 =====

/// 积分处理 Worker 池
pub struct AccrualWorkerPool<R, C> {
    ctx: Arc<WorkerContext<R, C>>,
    config: PoolConfig,
    /// 限流恢复时间点，只有调度器写入
    resume_at: watch::Sender<Option<Instant>>,
}

impl<R, C> AccrualWorkerPool<R, C>
where
    R: OrderRepositoryTrait + 'static,
    C: AccrualClient + 'static,
{
    pub fn new(repo: Arc<R>, client: Arc<C>, config: PoolConfig) -> Self {
        let config = config.normalized();
        let (resume_at, _) = watch::channel(None);

        Self {
            ctx: Arc::new(WorkerContext {
                repo,
                client,
                request_timeout: config.request_timeout,
            }),
            config,
            resume_at,
        }
    }

    /// 当前限流冷却的剩余时长
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let resume_at = (*self.resume_at.borrow())?;
        let now = Instant::now();
        (resume_at > now).then(|| resume_at - now)
    }

    /// 主循环：按间隔调度直到收到关闭信号
    ///
    /// 关闭后不再派发新批次，已排队未开始的订单被跳过，
    /// 进行中的查询在各自超时内结束，所有 Worker 退出后返回。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            workers = self.config.workers,
            poll_interval = ?self.config.poll_interval,
            batch_size = self.config.batch_size,
            request_timeout = ?self.config.request_timeout,
            "积分 Worker 池已启动"
        );

        let mut workers = self.spawn_workers(&shutdown);
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }

            if !self.wait_for_cooldown(&mut shutdown).await {
                break;
            }

            let report = self.dispatch(&mut workers, &shutdown).await;
            if report.selected > 0 {
                debug!(?report, "调度轮次完成");
            }
            metrics::set_worker_last_run(WORKER_NAME);
        }

        info!("收到关闭信号，等待 Worker 退出");
        workers.join().await;
        info!("积分 Worker 池已停止");
    }

    /// 执行单轮调度
    ///
    /// 使用一组临时 Worker 处理一批订单并等待全部完成。
    /// 冷却期内不拉取订单，直接返回空统计。
    pub async fn run_cycle(&self) -> CycleReport {
        let (_keep_alive, shutdown) = watch::channel(false);
        let mut workers = self.spawn_workers(&shutdown);
        let report = self.dispatch(&mut workers, &shutdown).await;
        workers.join().await;
        metrics::set_worker_last_run(WORKER_NAME);
        report
    }

    fn spawn_workers(&self, shutdown: &watch::Receiver<bool>) -> WorkerSet {
        let (job_tx, job_rx) = mpsc::channel(self.config.workers);
        let (report_tx, report_rx) = mpsc::channel(self.config.batch_size);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let handles = (0..self.config.workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    self.ctx.clone(),
                    job_rx.clone(),
                    report_tx.clone(),
                    self.resume_at.subscribe(),
                    shutdown.clone(),
                ))
            })
            .collect();

        WorkerSet {
            jobs: job_tx,
            reports: report_rx,
            handles,
        }
    }

    /// 冷却期内等待，返回 false 表示等待期间收到关闭信号
    async fn wait_for_cooldown(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let Some(remaining) = self.cooldown_remaining() else {
            return true;
        };

        info!(
            remaining_secs = remaining.as_secs_f64(),
            "积分服务限流冷却中，暂停派发"
        );

        tokio::select! {
            biased;

            _ = wait_for_shutdown(shutdown) => false,
            _ = tokio::time::sleep(remaining) => {
                info!("限流冷却结束，恢复派发");
                true
            }
        }
    }

    /// 拉取一批订单并分发，等待本批全部回报
    async fn dispatch(
        &self,
        workers: &mut WorkerSet,
        shutdown: &watch::Receiver<bool>,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        if self.cooldown_remaining().is_some() {
            return report;
        }

        let orders = match self.ctx.repo.select_pending(self.config.batch_size).await {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, "拉取待处理订单失败，跳过本轮");
                return report;
            }
        };

        report.selected = orders.len();
        if orders.is_empty() {
            return report;
        }
        metrics::record_dispatch_batch(orders.len());

        let mut queue: VecDeque<Order> = orders.into();
        let mut outstanding = 0usize;

        while !queue.is_empty() || outstanding > 0 {
            // 关闭或冷却开始后，剩余订单不再派发，下一轮重新拉取
            if !queue.is_empty() && (*shutdown.borrow() || self.cooldown_remaining().is_some()) {
                report.skipped += queue.len();
                queue.clear();
                continue;
            }

            tokio::select! {
                // 先处理回报，让限流信号尽早生效
                biased;

                received = workers.reports.recv(), if outstanding > 0 => {
                    let Some(job) = received else {
                        error!("Worker 全部退出，本轮提前结束");
                        break;
                    };
                    outstanding -= 1;
                    self.handle_report(&job);
                    report.record(job.outcome);
                }

                permit = workers.jobs.reserve(), if !queue.is_empty() => {
                    let Ok(permit) = permit else {
                        error!("任务队列已关闭，本轮提前结束");
                        break;
                    };
                    if let Some(order) = queue.pop_front() {
                        permit.send(order);
                        outstanding += 1;
                    }
                }
            }
        }

        report
    }

    /// 处理 Worker 回报；限流信号在这里延长池级冷却
    fn handle_report(&self, job: &JobReport) {
        let OrderOutcome::RateLimited(retry_after) = job.outcome else {
            return;
        };

        let now = Instant::now();
        let candidate = now
            .checked_add(retry_after.min(MAX_RETRY_AFTER))
            .unwrap_or(now);
        self.resume_at.send_if_modified(|resume_at| match resume_at {
            Some(current) if *current >= candidate => false,
            _ => {
                *resume_at = Some(candidate);
                true
            }
        });

        metrics::record_rate_limited(retry_after.as_secs_f64());
        warn!(
            order_number = %job.number,
            retry_after_secs = retry_after.as_secs(),
            "积分服务限流，暂停整个 Worker 池"
        );
    }
}
