//! 반복 상태 조회 태스크 핸들
//!
//! 핸들당 루프는 최대 하나만 실행됩니다. 루프가 살아 있는 동안 `start`는
//! 아무것도 하지 않고, `stop`은 몇 번을 호출해도 안전합니다.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use scanpost_core::metrics as m;

/// 스폰된 폴링 루프의 취소 가능한 핸들
#[derive(Debug, Default)]
pub struct Poller {
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// 스폰된 루프가 아직 끝나지 않았으면 `true`를 반환합니다.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 실행 중인 루프가 없을 때만 `make`로 만든 루프를 스폰합니다.
    ///
    /// `make`는 루프가 감시할 토큰을 받습니다. 이미 루프가 실행 중이라
    /// 아무것도 스폰하지 않았으면 `false`를 반환합니다.
    pub fn start<F, Fut>(&mut self, make: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_active() {
            return false;
        }

        let token = CancellationToken::new();
        let run = make(token.clone());
        let handle = tokio::spawn(tracked(run, token.clone()));
        self.cancel = Some(token);
        self.handle = Some(handle);
        metrics::gauge!(m::SCAN_POLLING_ACTIVE).set(1.0);
        true
    }

    /// 루프가 있으면 취소하고 중단시킵니다.
    ///
    /// 실행 중이던 루프를 멈췄으면 `true`를 반환합니다.
    pub fn stop(&mut self) -> bool {
        let was_active = self.is_active();
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        metrics::gauge!(m::SCAN_POLLING_ACTIVE).set(0.0);
        was_active
    }
}

/// 루프를 실행하고, 스스로 종료했을 때만 실행 gauge를 0으로 되돌립니다.
///
/// 취소된 루프는 gauge를 건드리지 않습니다. `stop`이 이미 0으로 설정했고
/// 그 사이 새 루프가 다시 1로 설정했을 수 있습니다.
async fn tracked<Fut>(run: Fut, token: CancellationToken)
where
    Fut: Future<Output = ()>,
{
    run.await;
    if !token.is_cancelled() {
        metrics::gauge!(m::SCAN_POLLING_ACTIVE).set(0.0);
    }
}
