#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Operator submitted new search text.
    SearchSubmitted(String),
    /// Operator clicked a column header.
    SortClicked(crate::SortColumn),
    /// Operator navigated to a page.
    PageChanged(u32),
    /// Operator picked a different page size.
    PageSizeChanged(u32),
    /// Operator ticked or unticked one row.
    TargetToggled(crate::TargetId),
    /// Header checkbox: select every visible row, or clear the selection.
    SelectAllToggled(bool),
    /// Operator asked to apply an action to the selected rows.
    BatchRequested(crate::BatchAction),
    /// A listing page arrived for the current request.
    ListingLoaded(crate::ListingSummary),
    NoOp,
}
