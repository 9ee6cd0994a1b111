//! [`BuilderArgs`] trait definition.

use lapin::types::{AMQPValue, FieldTable, LongString, LongUInt, ShortString};

/// Declaration arguments of a [`crate::Configuration`], passed as is to the
/// queue declaration and to every consumer registered on the queue.
pub trait BuilderArgs: Sized {
    /// The table the arguments are written to.
    fn get_args(&mut self) -> &mut FieldTable;

    /// Set any argument, replacing a previous value under the same key.
    #[must_use]
    fn arg<K, V>(mut self, k: K, v: V) -> Self
    where
        K: Into<ShortString>,
        V: Into<AMQPValue>,
    {
        self.get_args().insert(k.into(), v.into());
        self
    }

    /// Set a string argument, e.g. `x-queue-type`.
    #[must_use]
    fn arg_str<K, V>(self, k: K, v: V) -> Self
    where
        K: Into<ShortString>,
        V: Into<LongString>,
    {
        self.arg(k, AMQPValue::LongString(v.into()))
    }

    /// Set a millisecond or count argument, e.g. `x-message-ttl` or `x-expires`.
    #[must_use]
    fn arg_u32<K, V>(self, k: K, v: V) -> Self
    where
        K: Into<ShortString>,
        V: Into<LongUInt>,
    {
        self.arg(k, AMQPValue::LongUInt(v.into()))
    }
}
