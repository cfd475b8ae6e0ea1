//! Configuration merging logic
//!
//! A field from the overlay wins only when it differs from the default, so a
//! partial file or env overlay never resets values set by an earlier source.

use crate::{types::*, Config};

/// Take `overlay.$field` when it differs from the section default
macro_rules! merge_fields {
    ($base:ident, $overlay:ident, $default:ident; $($field:ident),+ $(,)?) => {
        $(
            if $overlay.$field != $default.$field {
                $base.$field = $overlay.$field;
            }
        )+
    };
}

/// Merge two configurations, with `overlay` taking precedence
pub fn merge(mut base: Config, overlay: Config) -> Config {
    base.core = merge_core(base.core, overlay.core);
    base.chunking = merge_chunking(base.chunking, overlay.chunking);
    base.fallback = merge_fallback(base.fallback, overlay.fallback);
    base.dedup = merge_dedup(base.dedup, overlay.dedup);
    base.pool = merge_pool(base.pool, overlay.pool);
    base.rate_limit = merge_rate_limit(base.rate_limit, overlay.rate_limit);
    base
}

fn merge_core(mut base: CoreConfig, overlay: CoreConfig) -> CoreConfig {
    let default = CoreConfig::default();
    merge_fields!(base, overlay, default; include_paths, exclude_paths, max_file_bytes);
    base
}

fn merge_chunking(mut base: ChunkingConfig, overlay: ChunkingConfig) -> ChunkingConfig {
    let default = ChunkingConfig::default();
    merge_fields!(base, overlay, default;
        min_tokens,
        max_tokens,
        overlap_tokens,
        chars_per_token,
        min_residual_chars,
        use_ast,
        oversize,
    );
    base
}

fn merge_fallback(mut base: FallbackConfig, overlay: FallbackConfig) -> FallbackConfig {
    let default = FallbackConfig::default();
    merge_fields!(base, overlay, default; window_chars, overlap_chars);
    base
}

fn merge_dedup(mut base: DedupConfig, overlay: DedupConfig) -> DedupConfig {
    let default = DedupConfig::default();
    merge_fields!(base, overlay, default;
        hash_algorithm,
        detect_near_duplicates,
        near_duplicate_distance,
        drop_near_duplicates,
        max_metadata_bytes,
        max_list_len,
        max_string_len,
    );
    base
}

fn merge_pool(mut base: PoolConfig, overlay: PoolConfig) -> PoolConfig {
    let default = PoolConfig::default();
    merge_fields!(base, overlay, default;
        max_workers,
        file_batch_size,
        timeout_multiplier,
        min_unit_timeout_ms,
        per_file_estimate_ms,
        per_kib_estimate_ms,
        tick_interval_ms,
    );
    base
}

fn merge_rate_limit(mut base: RateLimitConfig, overlay: RateLimitConfig) -> RateLimitConfig {
    let default = RateLimitConfig::default();
    merge_fields!(base, overlay, default;
        max_requests_per_window,
        window_secs,
        throttle_ratio,
        default_retry_after_secs,
    );
    base
}
