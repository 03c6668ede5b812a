//! # Replication Role
//!
//! Typed view of the `ROLE` reply. The reply is heterogeneous: its first
//! element names the role and decides the layout of the rest. The data is
//! informational only; nothing in the client routes or fails over on it.

use respool_proto::RespValue;

use crate::error::{ClientError, ClientResult};
use crate::reply::{element_i64, element_text, items, text_array};

/// One replica as listed by its master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaInfo {
    pub ip: String,
    pub port: u16,
    pub offset: i64,
}

/// Replication role of the connected server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Master {
        offset: i64,
        replicas: Vec<ReplicaInfo>,
    },
    Replica {
        master_ip: String,
        master_port: u16,
        state: String,
        data_received: i64,
    },
    Sentinel {
        masters: Vec<String>,
    },
}

impl Role {
    /// Role name as the server spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Master { .. } => "master",
            Role::Replica { .. } => "slave",
            Role::Sentinel { .. } => "sentinel",
        }
    }

    pub(crate) fn from_reply(reply: RespValue) -> ClientResult<Role> {
        let mut fields = items(reply)?.into_iter();
        let name = element_text(next_field(&mut fields, "role name")?)?;

        match name.as_str() {
            "master" => {
                let offset = element_i64(next_field(&mut fields, "replication offset")?)?;
                let replicas = items(next_field(&mut fields, "replica list")?)?
                    .into_iter()
                    .map(replica_info)
                    .collect::<ClientResult<Vec<_>>>()?;
                Ok(Role::Master { offset, replicas })
            }
            "slave" | "replica" => Ok(Role::Replica {
                master_ip: element_text(next_field(&mut fields, "master ip")?)?,
                master_port: port(next_field(&mut fields, "master port")?)?,
                state: element_text(next_field(&mut fields, "replication state")?)?,
                data_received: element_i64(next_field(&mut fields, "data received")?)?,
            }),
            "sentinel" => Ok(Role::Sentinel {
                masters: text_array(next_field(&mut fields, "master names")?)?,
            }),
            other => Err(ClientError::unexpected("master, slave or sentinel", other)),
        }
    }
}

fn replica_info(value: RespValue) -> ClientResult<ReplicaInfo> {
    let mut fields = items(value)?.into_iter();
    Ok(ReplicaInfo {
        ip: element_text(next_field(&mut fields, "replica ip")?)?,
        port: port(next_field(&mut fields, "replica port")?)?,
        offset: element_i64(next_field(&mut fields, "replica offset")?)?,
    })
}

fn port(value: RespValue) -> ClientResult<u16> {
    let port = element_i64(value)?;
    u16::try_from(port).map_err(|_| ClientError::unexpected("port number", &port.to_string()))
}

fn next_field(
    fields: &mut impl Iterator<Item = RespValue>,
    field: &str,
) -> ClientResult<RespValue> {
    fields
        .next()
        .ok_or_else(|| ClientError::unexpected(field, "end of array"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use respool_proto::{read_value, ReadLimits};

    fn decode(wire: &[u8]) -> RespValue {
        let mut line = Vec::new();
        read_value(&mut Cursor::new(wire.to_vec()), &mut line, &ReadLimits::default()).unwrap()
    }

    #[test]
    fn parses_master() {
        let reply = decode(b"*3\r\n$6\r\nmaster\r\n:3129659\r\n*2\r\n*3\r\n$9\r\n127.0.0.1\r\n$4\r\n9001\r\n$7\r\n3129242\r\n*3\r\n$9\r\n127.0.0.1\r\n$4\r\n9002\r\n$7\r\n3129543\r\n");
        let role = Role::from_reply(reply).unwrap();
        assert_eq!(role.name(), "master");
        assert_eq!(
            role,
            Role::Master {
                offset: 3129659,
                replicas: vec![
                    ReplicaInfo {
                        ip: "127.0.0.1".into(),
                        port: 9001,
                        offset: 3129242
                    },
                    ReplicaInfo {
                        ip: "127.0.0.1".into(),
                        port: 9002,
                        offset: 3129543
                    },
                ],
            }
        );
    }

    #[test]
    fn parses_replica() {
        let reply = decode(b"*5\r\n$5\r\nslave\r\n$9\r\n127.0.0.1\r\n:9000\r\n$9\r\nconnected\r\n:3167038\r\n");
        assert_eq!(
            Role::from_reply(reply).unwrap(),
            Role::Replica {
                master_ip: "127.0.0.1".into(),
                master_port: 9000,
                state: "connected".into(),
                data_received: 3167038,
            }
        );
    }

    #[test]
    fn parses_sentinel() {
        let reply = decode(b"*2\r\n$8\r\nsentinel\r\n*4\r\n$13\r\nresque-master\r\n$21\r\nhtml-fragments-master\r\n$12\r\nstats-master\r\n$15\r\nmetadata-master\r\n");
        match Role::from_reply(reply).unwrap() {
            Role::Sentinel { masters } => assert_eq!(
                masters,
                vec!["resque-master", "html-fragments-master", "stats-master", "metadata-master"]
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_or_truncated_roles() {
        let unknown = RespValue::array(vec![RespValue::bulk("leader")]);
        assert!(matches!(Role::from_reply(unknown), Err(ClientError::UnexpectedReply(_))));

        let truncated = RespValue::array(vec![RespValue::bulk("master"), RespValue::Integer(1)]);
        assert!(matches!(Role::from_reply(truncated), Err(ClientError::UnexpectedReply(_))));

        assert!(Role::from_reply(RespValue::array(vec![])).is_err());
    }
}
