use crate::credentials::CredentialSource;
use crate::error::Result;
use crate::gateway::{Connector, Gateway, ImageInfo, OmeroConnector, ALL_GROUPS};
use crate::rtypes::{Parameters, Value};

///Holds at most one session for the lifetime of the manager. Anything that needs the server
///connects lazily through here; the session is soft-closed when the manager is dropped.
pub struct ConnectionManager<C: Connector = OmeroConnector> {
    connector: C,
    credentials: CredentialSource,
    session: Option<C::Session>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn with_connector(connector: C, credentials: CredentialSource) -> Self {
        ConnectionManager {
            connector,
            credentials,
            session: None,
        }
    }

    ///Return the existing session, or resolve credentials and open one
    pub fn connect(&mut self) -> Result<&mut C::Session> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                let params = self.credentials.resolve()?;
                let session = self.connector.open(&params)?;
                log::info!("connected to {}:{}", params.host, params.port);
                session
            }
        };
        Ok(self.session.insert(session))
    }

    ///Run a projection query across all groups and unwrap every cell into a plain [Value].
    ///A single round trip: no paging, no retry.
    pub fn hql_query(&mut self, query: &str, params: &Parameters) -> Result<Vec<Vec<Value>>> {
        let session = self.connect()?;
        log::debug!("query: {}", query.split_whitespace().collect::<Vec<_>>().join(" "));
        let rows = session.projection(query, params, ALL_GROUPS)?;
        let rows = rows
            .iter()
            .map(|row| row.iter().map(Value::unwrap_rtype).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        log::debug!("query returned {} rows", rows.len());
        Ok(rows)
    }

    ///Image metadata, looked up across all groups
    pub fn image(&mut self, id: i64) -> Result<Option<ImageInfo>> {
        self.connect()?.image(id, ALL_GROUPS)
    }

    ///Close the session if there is one. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
