//! Response header folding.

use crate::transaction::record::FoldedHeaders;

/// Fold an ordered header list into one value per name.
///
/// Repeated names are joined with `", "` in encounter order. Names are
/// compared case-sensitively, exactly as the handler supplied them.
pub fn fold_headers<I>(pairs: I) -> FoldedHeaders
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut folded = FoldedHeaders::new();
    for (name, value) in pairs {
        folded.append(name, value);
    }
    folded
}
