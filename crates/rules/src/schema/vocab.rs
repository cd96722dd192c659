//! Statement classification vocabularies: operation kind, action, keyword.
//!
//! These are the string-typed dimension values. Policies persist them as
//! plain text; coercion maps the text back onto these enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PolicyError;

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = PolicyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(PolicyError::ValueShape(format!(
                        "'{}' is not a known {} value",
                        other,
                        stringify!($name)
                    ))),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

vocabulary! {
    /// Broad SQL statement category.
    OperateType {
        Unknown => "UNKNOWN",
        Dql => "DQL",
        Ddl => "DDL",
        Dml => "DML",
        Dcl => "DCL",
    }
}

vocabulary! {
    /// Leading verb of a statement.
    ActionType {
        Unknown => "unknown",
        Select => "select",
        Drop => "drop",
        Truncate => "truncate",
        Create => "create",
        Alter => "alter",
        Rename => "rename",
        Insert => "insert",
        Replace => "replace",
        Delete => "delete",
        Update => "update",
    }
}

vocabulary! {
    /// Fine-grained statement shape used by most operation policies.
    KeyWordType {
        Unknown => "unknown",
        Select => "select",
        DropTable => "drop table",
        DropTableIfExists => "drop table if exists",
        DropDatabase => "drop database",
        DropIndex => "drop index",
        DropProcedure => "drop procedure",
        DropFunction => "drop function",
        DropView => "drop view",
        DropTrigger => "drop trigger",
        TruncateTable => "truncate table",
        CreateTable => "create table",
        CreateTableAs => "create table as",
        CreateTemporaryTable => "create temporary table",
        CreateIndex => "create index",
        CreateUniqueIndex => "create unique index",
        CreateProcedure => "create procedure",
        CreateFunction => "create function",
        CreateView => "create view",
        CreateTrigger => "create trigger",
        AlterAddColumn => "alter add column",
        AlterDropColumn => "alter drop column",
        AlterModifyColumn => "alter modify column",
        AlterRenameColumn => "alter rename column",
        AlterChangeColumn => "alter change column",
        AlterAddPrimaryKey => "alter add primary key",
        AlterDropPrimaryKey => "alter drop primary key",
        AlterAddIndex => "alter add index",
        AlterAddUnique => "alter add unique",
        AlterAddUniqueIndex => "alter add unique index",
        AlterDropIndex => "alter drop index",
        Alter => "alter",
        RenameTable => "rename table",
        InsertSelect => "insert into select",
        Insert => "insert",
        Replace => "replace into",
        DeleteWhere => "delete from where",
        Delete => "delete from",
        UpdateWhere => "update set where",
        Update => "update set",
    }
}

impl KeyWordType {
    /// Statements that create the table they reference, so it cannot exist yet.
    pub fn creates_table(&self) -> bool {
        matches!(
            self,
            KeyWordType::CreateTable
                | KeyWordType::CreateTableAs
                | KeyWordType::CreateTemporaryTable
                | KeyWordType::DropTableIfExists
        )
    }
}
