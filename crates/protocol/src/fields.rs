/// The four fields of the shared remote document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Red,
    Blue,
    Green,
    Distance,
}

impl Field {
    /// Fan-out order for change notifications.
    pub const ALL: [Self; 4] = [Self::Red, Self::Blue, Self::Green, Self::Distance];

    /// Field name as stored in the remote document.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Distance => "distance",
        }
    }

    /// Tag the application sends to request a write of this field.
    pub const fn update_tag(self) -> &'static str {
        match self {
            Self::Red => "UpdateRed",
            Self::Blue => "UpdateBlue",
            Self::Green => "UpdateGreen",
            Self::Distance => "UpdateDistance",
        }
    }

    /// Tag the host sends to report this field's current value.
    pub const fn updated_tag(self) -> &'static str {
        match self {
            Self::Red => "UpdatedRed",
            Self::Blue => "UpdatedBlue",
            Self::Green => "UpdatedGreen",
            Self::Distance => "UpdatedDistance",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
