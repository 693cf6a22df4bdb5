/// Returns the unqualified name of the specified type for `Debug` output.
macro_rules! name_of {
    ($t:ty) => {{
        type _T = $t; // Keeps $t visible to refactoring tools
        stringify!($t)
    }};
}
pub(crate) use name_of;
