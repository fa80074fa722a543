/// Every user-facing message in actrail.
///
/// Text lives in the `Display` impl in `display.rs`; call sites only pick a
/// variant and supply its parameters.
#[derive(Debug, Clone)]
pub enum Message {
    // === CONFIGURATION ===
    ConfigSaved,
    ConfigDeleted,
    ConfigNotFound,
    ConfigInvalid(String),
    ConfigSectionPipeline,
    ConfigSectionServer,
    ConfigSectionUser,
    PromptSelectSections,
    PromptDebounce,
    PromptIdleTimeout,
    PromptBatchSize,
    PromptBatchInterval,
    PromptSubmissionConcurrency,
    PromptServerApiUrl,
    PromptServerAuthToken,
    PromptUserIdentity,
    DataDirectory(String),

    // === AGENT LIFECYCLE ===
    AgentStarted(String),           // source name
    AgentStopping,
    AgentStopped(u64, u64, u64),    // committed, lost, dropped events
    AgentStartFailed(String),
    ProcessorPanicked,
    WatchLocalOnly,
    WatchRemoteEnabled(String),     // endpoint
    WatchPressCtrlC,
    SignalListenFailed(String),

    // === PERSISTENCE ===
    BatchWriteFailed(usize, u32, String), // records, failures so far, error
    BatchDiscarded(usize, String),        // records, error
    BatcherDrainTimedOut(u64),            // grace seconds
    BatcherDrained(u64, u64),             // committed, lost
    RecordsLostAtShutdown(usize),
    RecordRejectedAfterShutdown(String),  // record id
    DatabaseOpenFailed(String),
    MigrationFailed(u32, String),         // version, error

    // === SUBMISSION ===
    CircuitBreakerOpened(u64),                          // cool-down seconds
    SubmissionDropped(String, String, String, u32, String), // id, timestamp, process, attempts, error
    DispatcherGraceExpired(u64, usize),                 // grace seconds, pending
    DispatcherStopped(u64, u64, u64),                   // delivered, dropped, abandoned
    CollectorInitFailed(String),

    // === STATUS & RECORDS ===
    AgentNotRunning,
    AgentStatusStale(String), // last update
    StatusHeader,
    RecordsNotFound,
    RecordsHeader(usize, u64), // shown, total
}
