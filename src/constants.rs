// Ingestion pipelines
pub mod indexer {
    /// Pipeline that advances quests to `claim` on matching transfers
    pub const PIPELINE_QUEST_ACTIONS: &str = "quest_actions";

    /// Pipeline that reconciles claimer events
    pub const PIPELINE_CLAIMS: &str = "claims";

    pub const DEFAULT_MAX_BLOCKS_PER_BATCH: u64 = 500;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
    pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

    pub const DEFAULT_QUEST_RPC_URL: &str = "https://zetachain-testnet.public.blastapi.io";
    pub const DEFAULT_CLAIM_RPC_URL: &str = "https://arbitrum-sepolia.gateway.tenderly.co";
}

// Leaderboard cache in the entity store
pub mod leaderboard {
    /// Roughly two minutes per block, so one hour
    pub const DEFAULT_BTL_BLOCKS: u64 = 30;

    pub const DEFAULT_TOP_K: usize = 25;

    /// Annotation every snapshot entity is tagged with
    pub const ENTITY_TYPE_KEY: &str = "type";
    pub const ENTITY_TYPE_VALUE: &str = "leaderboard";

    pub const DEFAULT_ENTITY_STORE_RPC_URL: &str = "https://ethwarsaw.holesky.golemdb.io/rpc";

    /// Annotation query selecting all snapshots
    pub fn snapshot_query() -> String {
        format!("{} = \"{}\"", ENTITY_TYPE_KEY, ENTITY_TYPE_VALUE)
    }
}
