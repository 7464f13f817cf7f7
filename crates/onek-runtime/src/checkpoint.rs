use crate::{
    ast::{AstCheckpoint, AstStore},
    scan::{ScanCheckpoint, ScanState},
};

/// Combined position of the input cursor and the node store.
///
/// Restoring it puts the parse back into exactly the state it was in when it was taken.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Checkpoint {
    pub scan: ScanCheckpoint,
    pub ast: AstCheckpoint,
}

impl Checkpoint {
    pub fn take<V>(scan: &ScanState<'_>, ast: &AstStore<'_, V>) -> Checkpoint {
        Checkpoint {
            scan: scan.checkpoint(),
            ast: ast.checkpoint(),
        }
    }

    pub fn restore<V>(self, scan: &mut ScanState<'_>, ast: &mut AstStore<'_, V>) {
        scan.rollback(self.scan);
        ast.rollback(self.ast);
    }
}
