//! Atom management.

use std::ops::Index;

use x11rb::atom_manager;
use x11rb::protocol::xproto;
use xdnd_core::protocol::ProtocolAtoms;

macro_rules! make_atom_manager {
    (
        $($name: ident),*
    ) => {
        /// The various atoms used by the drag source.
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub(crate) enum AtomName {
            $(
                $name,
            )*
        }

        atom_manager! {
            /// A collection of atoms used by the drag source.
            pub(crate) Atoms : AtomsCookie {
                $(
                    $name,
                )*
            }
        }

        impl Index<AtomName> for Atoms {
            type Output = xproto::Atom;

            fn index(&self, atom: AtomName) -> &Self::Output {
                match atom {
                    $(
                        AtomName::$name => &self.$name,
                    )*
                }
            }
        }
    };
}

make_atom_manager! {
    // Protocol messages and properties.
    XdndAware,
    XdndProxy,
    XdndEnter,
    XdndPosition,
    XdndStatus,
    XdndLeave,
    XdndDrop,
    XdndFinished,
    XdndSelection,
    XdndTypeList,
    XdndActionList,

    // Actions.
    XdndActionCopy,
    XdndActionMove,
    XdndActionLink,
    XdndActionAsk,
    XdndActionPrivate
}

pub(crate) use AtomName::*;

impl Atoms {
    /// The subset the engine works with.
    pub(crate) fn protocol(&self) -> ProtocolAtoms {
        ProtocolAtoms {
            aware: self[XdndAware],
            proxy: self[XdndProxy],
            enter: self[XdndEnter],
            position: self[XdndPosition],
            status: self[XdndStatus],
            leave: self[XdndLeave],
            drop: self[XdndDrop],
            finished: self[XdndFinished],
            selection: self[XdndSelection],
            type_list: self[XdndTypeList],
            action_list: self[XdndActionList],
            action_copy: self[XdndActionCopy],
            action_move: self[XdndActionMove],
            action_link: self[XdndActionLink],
            action_ask: self[XdndActionAsk],
            action_private: self[XdndActionPrivate],
        }
    }
}
