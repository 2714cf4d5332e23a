//! Which part of a project a source file belongs to.

use std::fmt;

use loadout_reader::Form;

/// The logical owner of a source file or declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleOrigin {
    /// The core declarations directory.
    Core,
    /// The user-override directory.
    Private,
    /// A feature module under `modules/<category>/<name>`.
    Module {
        /// The module category, e.g. `lang`.
        category: String,
        /// The module name, e.g. `rust`.
        name: String,
    },
}

impl ModuleOrigin {
    /// Creates a feature module origin.
    pub fn module(category: impl Into<String>, name: impl Into<String>) -> Self {
        ModuleOrigin::Module {
            category: category.into(),
            name: name.into(),
        }
    }

    /// The form this origin is recorded as in artifacts.
    ///
    /// `:core`, `:private`, or `'(:category . name)`.
    pub fn to_form(&self) -> Form {
        match self {
            ModuleOrigin::Core => Form::symbol(":core"),
            ModuleOrigin::Private => Form::symbol(":private"),
            ModuleOrigin::Module { category, name } => Form::quote(Form::dotted(
                vec![Form::symbol(format!(":{category}"))],
                Form::symbol(name.clone()),
            )),
        }
    }

    /// Parses the artifact form produced by [`ModuleOrigin::to_form`].
    pub fn from_form(form: &Form) -> Option<Self> {
        match form.as_symbol() {
            Some(":core") => return Some(ModuleOrigin::Core),
            Some(":private") => return Some(ModuleOrigin::Private),
            Some(_) => return None,
            None => {}
        }
        match &form.unquoted().kind {
            loadout_reader::FormKind::Dotted(items, tail) if items.len() == 1 => {
                let category = items[0].as_symbol()?.strip_prefix(':')?;
                let name = tail.as_symbol()?;
                Some(ModuleOrigin::module(category, name))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ModuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleOrigin::Core => write!(f, "core"),
            ModuleOrigin::Private => write!(f, "private"),
            ModuleOrigin::Module { category, name } => write!(f, ":{category} {name}"),
        }
    }
}
