use glam::{Vec2, Vec3};
use nom::{
    IResult as _IResult, Parser,
    bytes::complete::take,
    combinator::map,
    multi::count,
    number::complete::{le_f32, le_u16, le_u32},
};

pub type IResult<'a, T> = _IResult<&'a [u8], T>;
pub type NomError<'a> = nom::error::Error<&'a [u8]>;

pub fn vec3(i: &'_ [u8]) -> IResult<'_, Vec3> {
    map(count(le_f32, 3), |res| Vec3::from_slice(res.as_slice())).parse(i)
}

pub fn vec2(i: &'_ [u8]) -> IResult<'_, Vec2> {
    map((le_f32, le_f32), |(x, y)| Vec2::new(x, y)).parse(i)
}

/// 256 packed colors, the unit every palette layout is built from.
pub fn color_table(i: &'_ [u8]) -> IResult<'_, [u32; 256]> {
    map(count(le_u32, 256), |res| {
        let mut colors = [0u32; 256];
        colors.copy_from_slice(&res);
        colors
    })
    .parse(i)
}

/// Length prefixed string. The stored length is padded up to an even byte count.
pub fn sstring(i: &'_ [u8]) -> IResult<'_, String> {
    let (i, len) = le_u16::<_, NomError>(i)?;
    let padded = ((len as usize) + 1) & !1;
    let (i, bytes) = take::<_, _, NomError>(padded)(i)?;

    Ok((i, c_string(&bytes[..len as usize])))
}

/// Fixed width, NUL padded name.
pub fn fixed_string(width: usize) -> impl Fn(&[u8]) -> IResult<'_, String> {
    move |i| {
        let (i, bytes) = take::<_, _, NomError>(width)(i)?;
        Ok((i, c_string(bytes)))
    }
}

pub fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
