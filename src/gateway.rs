//! The remote side: the traits the rest of the crate talks to, and the real server behind them.
//! Queries go through the OMERO command line client, images through OMERO.web.

use image::DynamicImage;

use crate::credentials::ConnectionParams;
use crate::error::{Error, Result};
use crate::omero_cli::OmeroCli;
use crate::rtypes::Parameters;
use crate::web::WebSession;

///Group id meaning "every group the user can see"
pub const ALL_GROUPS: i64 = -1;

///One channel of a multi-channel image
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub label: String,
    pub color: [u8; 3],
}

///Dimensions and channels of an image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub id: i64,
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
    pub channels: Vec<ChannelInfo>,
}

///An authenticated session with the server
pub trait Gateway {
    ///Run a projection query, returning rows of still-wrapped cells
    fn projection(
        &self,
        query: &str,
        params: &Parameters,
        group: i64,
    ) -> Result<Vec<Vec<serde_json::Value>>>;

    ///Metadata of one image, `None` when it does not exist or is not visible
    fn image(&self, id: i64, group: i64) -> Result<Option<ImageInfo>>;

    ///The rendered plane at `z`, `t` using the image's current rendering settings
    fn render_plane(&self, image: i64, z: u32, t: u32) -> Result<DynamicImage>;

    ///Soft close: forget the session locally, leave it alive on the server
    fn close(&mut self);
}

///Opens sessions. Split from [Gateway] so that connecting stays lazy.
pub trait Connector {
    type Session: Gateway;

    fn open(&self, params: &ConnectionParams) -> Result<Self::Session>;
}

///Connects to an OMERO server. Without a web address only queries are available.
#[derive(Debug, Clone, Default)]
pub struct OmeroConnector {
    pub cli: OmeroCli,
    pub web_url: Option<String>,
}

pub struct OmeroSession {
    cli: OmeroCli,
    web: Option<WebSession>,
}

impl Connector for OmeroConnector {
    type Session = OmeroSession;

    fn open(&self, params: &ConnectionParams) -> Result<OmeroSession> {
        self.cli.login(params)?;
        let web = match &self.web_url {
            Some(url) => Some(WebSession::login(url, params)?),
            None => None,
        };
        Ok(OmeroSession {
            cli: self.cli.clone(),
            web,
        })
    }
}

impl OmeroSession {
    fn web(&self) -> Result<&WebSession> {
        self.web.as_ref().ok_or(Error::NoWebGateway)
    }
}

impl Gateway for OmeroSession {
    fn projection(
        &self,
        query: &str,
        params: &Parameters,
        group: i64,
    ) -> Result<Vec<Vec<serde_json::Value>>> {
        self.cli.projection(query, params, group)
    }

    fn image(&self, id: i64, group: i64) -> Result<Option<ImageInfo>> {
        self.web()?.image(id, group)
    }

    fn render_plane(&self, image: i64, z: u32, t: u32) -> Result<DynamicImage> {
        self.web()?.render_plane(image, z, t)
    }

    fn close(&mut self) {
        if let Some(web) = &mut self.web {
            web.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_need_a_web_address() {
        let session = OmeroSession {
            cli: OmeroCli::default(),
            web: None,
        };
        assert!(matches!(session.image(1, ALL_GROUPS), Err(Error::NoWebGateway)));
        assert!(matches!(session.render_plane(1, 0, 0), Err(Error::NoWebGateway)));
    }

    #[test]
    fn login_failure_stops_before_the_web_gateway() {
        let connector = OmeroConnector {
            cli: OmeroCli {
                program: "false".into(),
            },
            web_url: Some("http://127.0.0.1:9".into()),
        };
        let params = ConnectionParams {
            host: "localhost".into(),
            port: 4064,
            username: Some("root".into()),
            password: Some("omero".into()),
            session_uuid: None,
        };
        assert!(matches!(connector.open(&params), Err(Error::Authentication)));
    }
}
