pub mod fees;
pub mod merge;

pub use fees::{
    FeeTransfers, add_fees_to_plan, fee_in_coin_transaction, fee_in_native_transaction,
    transaction_with_fees_after_swap, transaction_with_fees_before_swap,
};
pub use merge::{
    MergeError, MergeLookup, MergeOutcome, MergedCoinsStructure, consolidate_coins,
    merge_all_coins, merge_by_structure, merged_coins_structure,
};
