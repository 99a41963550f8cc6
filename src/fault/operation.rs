//! The closed vocabulary of filesystem calls the remote service can intercept.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declares the operation enum together with its wire strings so the two
/// can never drift apart.
macro_rules! operations {
    ($($(#[$doc:meta])* $variant:ident => $wire:literal,)+) => {
        /// A filesystem call type the fault-injecting service can perturb.
        ///
        /// The wire string (see [`InterceptableOperation::wire_name`]) is the
        /// protocol contract; the variant order carries no meaning on the wire.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum InterceptableOperation {
            $($(#[$doc])* $variant,)+
        }

        impl InterceptableOperation {
            /// Every operation, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// The stable identifier transmitted to the service.
            #[must_use]
            pub const fn wire_name(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            /// Looks an operation up by its wire identifier.
            #[must_use]
            pub fn from_wire_name(name: &str) -> Option<Self> {
                match name {
                    $($wire => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

operations! {
    /// Attribute query.
    Getattr => "getattr",
    /// Symbolic link read.
    Readlink => "readlink",
    /// Node creation.
    Mknod => "mknod",
    /// Directory creation.
    Mkdir => "mkdir",
    /// File removal.
    Unlink => "unlink",
    /// Directory removal.
    Rmdir => "rmdir",
    /// Symbolic link creation.
    Symlink => "symlink",
    /// Rename.
    Rename => "rename",
    /// Hard link creation.
    Link => "link",
    /// Permission change.
    Chmod => "chmod",
    /// Ownership change.
    Chown => "chown",
    /// Truncate by path.
    Truncate => "truncate",
    /// File open.
    Open => "open",
    /// File read.
    Read => "read",
    /// File write.
    Write => "write",
    /// Filesystem statistics.
    Statfs => "statfs",
    /// Flush on close.
    Flush => "flush",
    /// Release of an open file.
    Release => "release",
    /// File sync.
    Fsync => "fsync",
    /// Extended attribute set.
    Setxattr => "setxattr",
    /// Extended attribute get.
    Getxattr => "getxattr",
    /// Extended attribute listing.
    Listxattr => "listxattr",
    /// Extended attribute removal.
    Removexattr => "removexattr",
    /// Directory open.
    Opendir => "opendir",
    /// Directory read.
    Readdir => "readdir",
    /// Release of an open directory.
    Releasedir => "releasedir",
    /// Directory sync.
    Fsyncdir => "fsyncdir",
    /// Access check.
    Access => "access",
    /// File creation.
    Create => "create",
    /// Truncate by handle.
    Ftruncate => "ftruncate",
    /// Attribute query by handle.
    Fgetattr => "fgetattr",
    /// POSIX locking.
    Lock => "lock",
    /// Block map.
    Bmap => "bmap",
    /// Ioctl.
    Ioctl => "ioctl",
    /// Poll.
    Poll => "poll",
    /// Buffered write.
    WriteBuf => "write_buf",
    /// Buffered read.
    ReadBuf => "read_buf",
    /// Advisory lock.
    Flock => "flock",
    /// Preallocation.
    Fallocate => "fallocate",
}

impl fmt::Display for InterceptableOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Error returned when a name is not part of the operation vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interceptable operation: {0:?}")]
pub struct UnknownOperation(pub String);

impl FromStr for InterceptableOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire_name(s).ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

impl Serialize for InterceptableOperation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_name())
    }
}

impl<'de> Deserialize<'de> for InterceptableOperation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
