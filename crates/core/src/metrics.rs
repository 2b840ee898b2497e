//! 메트릭 이름 및 설명
//!
//! 모든 크레이트는 이 상수를 사용해 `metrics` 파사드로 기록합니다.
//! 호스트 애플리케이션이 recorder를 설치하지 않으면 아무것도 내보내지 않습니다.
//!
//! # 명명 규칙
//!
//! - 접두사: `scanpost_`
//! - 접미사: `_total` (counter), `_bytes` (바이트 counter), 없음 (gauge)
//!
//! ```ignore
//! metrics::counter!(scanpost_core::metrics::SCAN_POLL_TICKS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 ─────────────────────────────────────────────────────

/// 판정 레이블 (clean, infected, error)
pub const LABEL_VERDICT: &str = "verdict";

/// 실패 종류 레이블 (network, protocol, timeout, ...)
pub const LABEL_KIND: &str = "kind";

// ─── 오케스트레이터 ───────────────────────────────────────────────

/// `Uploading`에 진입한 세션 수 (counter)
pub const SCAN_SESSIONS_STARTED_TOTAL: &str = "scanpost_scan_sessions_started_total";

/// `Completed`에 도달한 세션 수 (counter, label: verdict)
pub const SCAN_SESSIONS_COMPLETED_TOTAL: &str = "scanpost_scan_sessions_completed_total";

/// `Failed`에 도달한 세션 수 (counter, label: kind)
pub const SCAN_SESSIONS_FAILED_TOTAL: &str = "scanpost_scan_sessions_failed_total";

/// 상태 머신 진입 전에 거부된 제출 수 (counter, label: kind)
pub const SCAN_SUBMISSIONS_REJECTED_TOTAL: &str = "scanpost_scan_submissions_rejected_total";

/// 상태 조회 횟수 (counter)
pub const SCAN_POLL_TICKS_TOTAL: &str = "scanpost_scan_poll_ticks_total";

/// 업로드로 전송 계층에 넘긴 바이트 수 (counter)
pub const SCAN_UPLOAD_BYTES: &str = "scanpost_scan_upload_bytes";

/// 폴링 루프 실행 여부 (gauge, 0 또는 1)
pub const SCAN_POLLING_ACTIVE: &str = "scanpost_scan_polling_active";

/// 모든 메트릭의 HELP 텍스트를 등록합니다.
///
/// recorder 설치 후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        SCAN_SESSIONS_STARTED_TOTAL,
        "Scan sessions that started uploading"
    );
    describe_counter!(
        SCAN_SESSIONS_COMPLETED_TOTAL,
        "Scan sessions that finished with a result, by verdict"
    );
    describe_counter!(
        SCAN_SESSIONS_FAILED_TOTAL,
        "Scan sessions that failed before a result was fetched, by kind"
    );
    describe_counter!(
        SCAN_SUBMISSIONS_REJECTED_TOTAL,
        "Submissions rejected by validation or the concurrency guard"
    );
    describe_counter!(SCAN_POLL_TICKS_TOTAL, "Status checks issued while polling");
    describe_counter!(SCAN_UPLOAD_BYTES, "Bytes handed to the transport by uploads");
    describe_gauge!(SCAN_POLLING_ACTIVE, "1 while a poll loop is running");
}
