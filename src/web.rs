//! Image metadata and rendered planes from the OMERO.web gateway.

use image::DynamicImage;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::REFERER;
use serde::Deserialize;

use crate::credentials::ConnectionParams;
use crate::error::{Error, Result};
use crate::gateway::{ChannelInfo, ImageInfo};

///Logged in OMERO.web session, authenticated by cookie
pub struct WebSession {
    client: Client,
    base: String,
    csrf: String,
    open: bool,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Deserialize)]
struct ImgData {
    id: i64,
    size: ImgSize,
    #[serde(default)]
    channels: Vec<ImgChannel>,
}

#[derive(Deserialize)]
struct ImgSize {
    width: u32,
    height: u32,
    z: u32,
}

#[derive(Deserialize)]
struct ImgChannel {
    label: String,
    color: String,
}

///Normalised web address: no trailing slash, `https://` unless a scheme is given.
///OMERO.web is its own server, so the address never comes from the Ice host and port.
pub fn web_base(web_url: &str) -> String {
    let url = web_url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

///Username and password for the login form. A session uuid doubles as both.
pub fn login_form(params: &ConnectionParams) -> (String, String) {
    match &params.session_uuid {
        Some(uuid) => (uuid.clone(), uuid.clone()),
        None => (
            params.username.clone().unwrap_or_default(),
            params.password.clone().unwrap_or_default(),
        ),
    }
}

///Parse `RRGGBB` as sent for channel colors
pub fn parse_hex_rgb(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([byte(0)?, byte(2)?, byte(4)?])
}

fn http_error(url: &str) -> impl FnOnce(reqwest::Error) -> Error + '_ {
    move |source| Error::Http {
        url: url.to_string(),
        source,
    }
}

impl WebSession {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn send(&self, url: &str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().map_err(http_error(url))?;
        if !response.status().is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    ///Fetch a CSRF token and log in to the first server OMERO.web is configured for
    pub fn login(web_url: &str, params: &ConnectionParams) -> Result<WebSession> {
        let base = web_base(web_url);
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(http_error(&base))?;
        let mut session = WebSession {
            client,
            base,
            csrf: String::new(),
            open: false,
        };

        let url = session.url("/api/v0/token/");
        let token: DataEnvelope<String> = session
            .send(&url, session.client.get(&url))?
            .json()
            .map_err(http_error(&url))?;
        session.csrf = token.data;

        let (username, password) = login_form(params);
        let url = session.url("/api/v0/login/");
        log::debug!("logging in to {}", session.base);
        let response = session
            .client
            .post(&url)
            .header("X-CSRFToken", &session.csrf)
            .header(REFERER, &session.base)
            .form(&[
                ("username", username.as_str()),
                ("password", password.as_str()),
                ("server", "1"),
            ])
            .send()
            .map_err(http_error(&url))?;
        //a refused login answers 403 with a message body
        if !response.status().is_success() {
            return Err(Error::Authentication);
        }
        let login: LoginResponse = response.json().map_err(http_error(&url))?;
        if !login.success {
            return Err(Error::Authentication);
        }
        session.open = true;
        Ok(session)
    }

    ///Metadata of one image, `None` on HTTP 404
    pub fn image(&self, id: i64, group: i64) -> Result<Option<ImageInfo>> {
        let url = self.url(&format!("/webgateway/imgData/{id}/"));
        let response = self
            .client
            .get(&url)
            .query(&[("group", group)])
            .send()
            .map_err(http_error(&url))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        let data: ImgData = response.json().map_err(http_error(&url))?;
        image_info(data).map(Some)
    }

    pub fn render_plane(&self, image: i64, z: u32, t: u32) -> Result<DynamicImage> {
        let url = self.url(&format!("/webgateway/render_image/{image}/{z}/{t}/"));
        let bytes = self
            .send(&url, self.client.get(&url))?
            .bytes()
            .map_err(http_error(&url))?;
        Ok(image::load_from_memory(&bytes)?)
    }

    ///Forget the session locally; the server side stays alive
    pub fn close(&mut self) {
        if self.open {
            log::debug!("closing session with {}", self.base);
            self.open = false;
            self.csrf.clear();
        }
    }
}

fn image_info(data: ImgData) -> Result<ImageInfo> {
    let channels = data
        .channels
        .into_iter()
        .map(|c| {
            let color = parse_hex_rgb(&c.color).ok_or_else(|| {
                Error::Response(format!("channel {} has color {:?}", c.label, c.color))
            })?;
            Ok(ChannelInfo {
                label: c.label,
                color,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ImageInfo {
        id: data.id,
        size_x: data.size.width,
        size_y: data.size.height,
        size_z: data.size.z,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::params_from_session;

    #[test]
    fn web_address_is_used_as_given() {
        assert_eq!(web_base("omero.example.org/"), "https://omero.example.org");
        assert_eq!(web_base("http://localhost:4080/"), "http://localhost:4080");
        assert_eq!(web_base(" https://web.example.org/omero "), "https://web.example.org/omero");
    }

    #[test]
    fn session_store_port_stays_out_of_the_web_address() {
        let sessions = tempfile::tempdir().unwrap();
        let dir = sessions.path();
        std::fs::write(dir.join("._LASTHOST_"), "omero.example.org").unwrap();
        let user = dir.join("omero.example.org").join("bob");
        std::fs::create_dir_all(&user).unwrap();
        std::fs::write(dir.join("omero.example.org").join("._LASTUSER_"), "bob").unwrap();
        std::fs::write(user.join("._LASTSESS_"), "abc-123").unwrap();
        std::fs::write(user.join("abc-123"), "omero.port=4064\n").unwrap();

        let params = params_from_session(dir).unwrap().unwrap();
        assert_eq!(params.port, 4064);
        let base = web_base("web.example.org");
        assert_eq!(base, "https://web.example.org");
        assert!(!base.contains("4064"));
        assert_eq!(login_form(&params), ("abc-123".to_string(), "abc-123".to_string()));
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_rgb("FF0000"), Some([255, 0, 0]));
        assert_eq!(parse_hex_rgb("#00ff7f"), Some([0, 255, 127]));
        assert_eq!(parse_hex_rgb("F00"), None);
        assert_eq!(parse_hex_rgb("GG0000"), None);
    }

    #[test]
    fn img_data_payload_becomes_image_info() {
        let payload = r#"{"id": 12, "size": {"width": 64, "height": 32, "z": 5, "t": 1, "c": 2},
            "channels": [{"label": "DAPI", "color": "0000FF", "active": true},
                         {"label": "GFP", "color": "00FF00"}]}"#;
        let data: ImgData = serde_json::from_str(payload).unwrap();
        let info = image_info(data).unwrap();
        assert_eq!(info.id, 12);
        assert_eq!((info.size_x, info.size_y, info.size_z), (64, 32, 5));
        assert_eq!(info.channels[0].color, [0, 0, 255]);
        assert_eq!(info.channels[1].label, "GFP");
    }
}
