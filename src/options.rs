use bitflags::bitflags;

bitflags! {
    /// Per-call behavior switches. A [Codec](crate::Codec) carries
    /// defaults; every call may override them.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Options: u32 {
        /// Skip properties a record shape does not declare, instead of
        /// failing.
        const IGNORE_UNKNOWN_PROPERTIES = 1 << 0;
        /// Accept a bare string where a sequence or a single-field
        /// record is expected.
        const UNWRAP_STRINGS            = 1 << 1;
        /// Emit record fields by name instead of declaration order.
        const SORT_ALPHABETICALLY       = 1 << 2;
        /// Treat every field as
        /// [NotDefault](crate::FieldPolicy::NotDefault) when writing.
        const NON_DEFAULT_ONLY          = 1 << 3;
    }
}
